use std::time::Duration;

use dropwatch_engine::{DriverFailure, DriverSettings, HttpDriver, PageDriver};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn navigate_returns_the_settled_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let driver = HttpDriver::new(DriverSettings::default()).unwrap();
    let url = format!("{}/doc", server.uri());
    let page = driver.navigate(&url, TIMEOUT).await.expect("navigate ok");

    assert_eq!(page.final_url, url);
    assert_eq!(page.body, "<html>ok</html>");
}

#[tokio::test]
async fn navigate_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let driver = HttpDriver::new(DriverSettings::default()).unwrap();
    let url = format!("{}/missing", server.uri());
    let err = driver.navigate(&url, TIMEOUT).await.unwrap_err();
    assert_eq!(err.kind, DriverFailure::HttpStatus(404));
}

#[tokio::test]
async fn navigate_times_out_on_a_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let driver = HttpDriver::new(DriverSettings::default()).unwrap();
    let url = format!("{}/slow", server.uri());
    let err = driver
        .navigate(&url, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind, DriverFailure::Timeout);
}

#[tokio::test]
async fn navigate_rejects_too_large_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .insert_header("Content-Length", "11")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = DriverSettings {
        max_bytes: 10,
        ..DriverSettings::default()
    };
    let driver = HttpDriver::new(settings).unwrap();
    let url = format!("{}/large", server.uri());
    let err = driver.navigate(&url, TIMEOUT).await.unwrap_err();
    assert_eq!(
        err.kind,
        DriverFailure::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn invalid_urls_never_reach_the_network() {
    let driver = HttpDriver::new(DriverSettings::default()).unwrap();
    let err = driver.navigate("not a url", TIMEOUT).await.unwrap_err();
    assert_eq!(err.kind, DriverFailure::InvalidUrl);
}
