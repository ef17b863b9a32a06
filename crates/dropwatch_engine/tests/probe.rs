use std::sync::Once;
use std::time::{Duration, Instant};

use dropwatch_core::{collect_ranked, Markers, RunVerdict, Status};
use dropwatch_engine::{
    CancelToken, DriverSettings, HttpDriver, ProbeSettings, Prober, RunLog,
};
use pretty_assertions::assert_eq;
use scraper::Selector;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

fn sold_out_page(id: u32) -> String {
    format!(
        "<!doctype html><h2>Post {id}</h2>\
         <a class=\"buy-button disabled\" href=\"#\">売り切れてます</a>"
    )
}

fn buyable_page(id: u32) -> String {
    format!(
        "<!doctype html><h2>Post {id}</h2>\
         <a class=\"buy-button\" href=\"/posts/{id}/charge_confirmation\">購入する</a>"
    )
}

async fn mount_post(server: &MockServer, id: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/posts/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn settings(allow_action: bool) -> ProbeSettings {
    ProbeSettings {
        markers: Markers::default(),
        buy_selector: Selector::parse("a.buy-button").unwrap(),
        navigation_timeout: Duration::from_secs(2),
        action_timeout: Duration::from_millis(1_500),
        allow_action,
    }
}

fn candidates(server: &MockServer, ids: &[u32]) -> Vec<dropwatch_core::Candidate> {
    collect_ranked(
        ids.iter().map(|id| format!("{}/posts/{id}", server.uri())),
        ids.len(),
    )
}

struct Fixture {
    _temp: TempDir,
    log_path: std::path::PathBuf,
    log: RunLog,
    driver: HttpDriver,
}

fn fixture() -> Fixture {
    init_logging();
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("status.csv");
    let log = RunLog::open(&log_path, "creator-a").unwrap();
    let driver = HttpDriver::new(DriverSettings::default()).unwrap();
    Fixture {
        _temp: temp,
        log_path,
        log,
        driver,
    }
}

fn logged_rows(log_path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(log_path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn first_buyable_halts_the_run() {
    let server = MockServer::start().await;
    for id in [1001, 1002, 1004, 1005] {
        mount_post(&server, id, sold_out_page(id)).await;
    }
    mount_post(&server, 1003, buyable_page(1003)).await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[1001, 1002, 1003, 1004, 1005]);
    let settings = settings(false);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert!(result.finished);
    assert_eq!(result.found, RunVerdict::Found(Status::Buyable));
    assert_eq!(result.checked, 3);
    let winner = result.winner.unwrap();
    assert_eq!(winner.candidate.rank, 3);
    assert!(winner.candidate.identifier.ends_with("/posts/1003"));
    assert!(winner.elapsed_ms >= 0.0);

    // Ranks 4 and 5 were never probed and never logged.
    let rows = logged_rows(&fx.log_path);
    assert_eq!(rows.len(), 3);
    assert!(!rows.iter().any(|row| row.contains("/posts/1004")));
    assert!(!rows.iter().any(|row| row.contains("/posts/1005")));
    assert!(rows[2].contains("buyable"));
}

#[tokio::test]
async fn navigation_failure_is_contained_to_its_rank() {
    let server = MockServer::start().await;
    mount_post(&server, 2001, sold_out_page(2001)).await;
    // 2002 is not mounted: the driver sees a 404.
    mount_post(&server, 2003, sold_out_page(2003)).await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[2001, 2002, 2003]);
    let settings = settings(false);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert_eq!(result.found, RunVerdict::Nothing);
    assert_eq!(result.checked, 3);

    let rows = logged_rows(&fx.log_path);
    assert_eq!(rows.len(), 3);
    assert!(rows[1].contains("unknown"));
    assert!(rows[1].contains("navigation failed"));
    assert!(rows[2].contains("sold_out"));
}

#[tokio::test]
async fn allowed_action_upgrades_buyable_to_claimed() {
    let server = MockServer::start().await;
    mount_post(&server, 3001, buyable_page(3001)).await;
    Mock::given(method("GET"))
        .and(path("/posts/3001/charge_confirmation"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<h2>Charge Confirmation</h2>", "text/html"),
        )
        .mount(&server)
        .await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[3001]);
    let settings = settings(true);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert_eq!(result.found, RunVerdict::Found(Status::Claimed));
    assert_eq!(result.checked, 1);
    assert_eq!(result.winner.unwrap().status, Status::Claimed);
}

#[tokio::test]
async fn failed_claim_continues_to_the_next_candidate() {
    let server = MockServer::start().await;
    mount_post(&server, 4001, buyable_page(4001)).await;
    Mock::given(method("GET"))
        .and(path("/posts/4001/charge_confirmation"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_post(&server, 4002, buyable_page(4002)).await;
    Mock::given(method("GET"))
        .and(path("/posts/4002/charge_confirmation"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<h2>Charge Confirmation</h2>", "text/html"),
        )
        .mount(&server)
        .await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[4001, 4002]);
    let settings = settings(true);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert_eq!(result.found, RunVerdict::Found(Status::Claimed));
    assert_eq!(result.checked, 2);
    assert_eq!(result.winner.unwrap().candidate.rank, 2);

    let rows = logged_rows(&fx.log_path);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("click_failed"));
    assert!(rows[1].contains("claimed"));
}

#[tokio::test]
async fn dry_run_never_touches_the_confirmation_flow() {
    let server = MockServer::start().await;
    mount_post(&server, 5001, buyable_page(5001)).await;
    // No confirmation mount: an attempted claim would come back click_failed.

    let mut fx = fixture();
    let candidates = candidates(&server, &[5001]);
    let settings = settings(false);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert_eq!(result.found, RunVerdict::Found(Status::Buyable));
}

#[tokio::test]
async fn missing_element_is_not_found_and_run_continues() {
    let server = MockServer::start().await;
    mount_post(
        &server,
        6001,
        "<!doctype html><h2>Post 6001</h2><p>nothing for sale</p>".to_string(),
    )
    .await;
    mount_post(&server, 6002, sold_out_page(6002)).await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[6001, 6002]);
    let settings = settings(false);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober
        .run(&candidates, Instant::now(), &CancelToken::new())
        .await;

    assert_eq!(result.found, RunVerdict::Nothing);
    let rows = logged_rows(&fx.log_path);
    assert!(rows[0].contains("not_found"));
}

#[tokio::test]
async fn cancellation_stops_before_the_next_candidate() {
    let server = MockServer::start().await;
    mount_post(&server, 7001, sold_out_page(7001)).await;
    mount_post(&server, 7002, sold_out_page(7002)).await;

    let mut fx = fixture();
    let candidates = candidates(&server, &[7001, 7002]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let settings = settings(false);
    let mut prober = Prober::new(&fx.driver, &mut fx.log, &settings);
    let result = prober.run(&candidates, Instant::now(), &cancel).await;

    assert_eq!(result.found, RunVerdict::Nothing);
    assert_eq!(result.checked, 0);
    assert!(result.error_note.unwrap().contains("cancelled"));
    assert!(logged_rows(&fx.log_path).is_empty());
}
