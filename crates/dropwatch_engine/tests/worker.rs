use std::thread;
use std::time::{Duration, Instant, SystemTime};

use dropwatch_core::{RunConfig, RunResult, RunVerdict, Status, TargetConfig};
use dropwatch_engine::{WatchHandle, WorkerEvent};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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

fn listing_page() -> String {
    (1001..=1005)
        .map(|id| format!("<a href=\"/posts/{id}\">post {id}</a>\n"))
        .collect()
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/creators/3544"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(listing_page(), "text/html"))
        .mount(server)
        .await;
    for id in [1001u32, 1002, 1004, 1005] {
        Mock::given(method("GET"))
            .and(path(format!("/posts/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sold_out_page(id), "text/html"))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/posts/1003"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(buyable_page(1003), "text/html"))
        .mount(server)
        .await;
}

fn config(server: &MockServer, temp: &TempDir) -> RunConfig {
    RunConfig {
        base_url: server.uri(),
        target: TargetConfig {
            name: "creator-a".to_string(),
            listing_url: "/creators/3544".to_string(),
            ..TargetConfig::default()
        },
        log_path: temp.path().join("status.csv"),
        session_path: temp.path().join("auth.json"),
        ..RunConfig::default()
    }
}

fn drain_for_result(handle: &WatchHandle, budget: Duration) -> RunResult {
    let deadline = Instant::now() + budget;
    loop {
        if let Some(WorkerEvent::Finished(result)) = handle.try_recv() {
            return result;
        }
        assert!(Instant::now() < deadline, "worker did not finish in time");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn armed_run_fires_and_reports_the_winner() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_site(&server).await;
        server
    });
    let temp = TempDir::new().unwrap();

    let handle = WatchHandle::new();
    // A target of "now" truncates into the current minute and fires
    // immediately.
    handle.arm(config(&server, &temp), SystemTime::now());

    let result = drain_for_result(&handle, Duration::from_secs(30));
    assert!(result.finished);
    assert_eq!(result.found, RunVerdict::Found(Status::Buyable));
    assert_eq!(result.checked, 3);
    assert!(result
        .winner
        .unwrap()
        .candidate
        .identifier
        .ends_with("/posts/1003"));

    let log = std::fs::read_to_string(temp.path().join("status.csv")).unwrap();
    assert_eq!(log.lines().count(), 4); // header + three probed ranks
}

#[test]
fn setup_failure_surfaces_as_an_error_result() {
    let temp = TempDir::new().unwrap();
    let mut config = RunConfig {
        base_url: "not a url".to_string(),
        log_path: temp.path().join("status.csv"),
        session_path: temp.path().join("auth.json"),
        ..RunConfig::default()
    };
    config.target.listing_url = "/creators/1".to_string();

    let handle = WatchHandle::new();
    handle.arm(config, SystemTime::now());

    let result = drain_for_result(&handle, Duration::from_secs(10));
    assert_eq!(result.found, RunVerdict::Error);
    assert!(result.error_note.unwrap().contains("base url"));
}

#[test]
fn cancellation_before_the_deadline_skips_the_run() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_site(&server).await;
        server
    });
    let temp = TempDir::new().unwrap();

    let handle = WatchHandle::new();
    // Two minutes out stays in the future even after minute truncation.
    handle.arm(config(&server, &temp), SystemTime::now() + Duration::from_secs(120));
    thread::sleep(Duration::from_millis(300));
    handle.cancel();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match handle.try_recv() {
            Some(WorkerEvent::Running(false)) => break,
            Some(WorkerEvent::Finished(result)) => {
                panic!("cancelled run still produced a result: {result:?}");
            }
            _ => {}
        }
        assert!(Instant::now() < deadline, "no cancellation acknowledged");
        thread::sleep(Duration::from_millis(20));
    }
}
