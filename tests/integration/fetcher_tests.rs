use restock_watcher::AppError;
use restock_watcher::config::ScraperConfig;
use restock_watcher::plugins::PageFetcher;
use restock_watcher::plugins::fetchers::{FallbackFetcher, HttpFetcher};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::listing_html;

fn scraper(cookie: Option<&str>) -> ScraperConfig {
    ScraperConfig {
        request_timeout: 5,
        cookie: cookie.map(str::to_string),
        ..ScraperConfig::default()
    }
}

#[tokio::test]
async fn test_http_fetcher_sends_configured_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(query_param("gid", "1"))
        .and(header("cookie", "PHPSESSID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[("HK-1", 2)])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&scraper(Some("PHPSESSID=abc")), &server.uri()).unwrap();
    let page = fetcher
        .fetch(&format!("{}/cart?fid=1&gid=1", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.strategy, "http");
    assert!(page.body.contains("HK-1"));
}

#[tokio::test]
async fn test_warm_up_cookies_are_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "cf_clearance=xyz; Path=/"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(header("cookie", "cf_clearance=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&scraper(None), &server.uri()).unwrap();
    fetcher.refresh_session().await.unwrap();

    let page = fetcher.fetch(&format!("{}/cart", server.uri())).await;
    assert!(page.is_ok(), "expected cookie replay, got: {page:?}");
}

#[tokio::test]
async fn test_challenge_response_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/challenge"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("server", "cloudflare")
                .insert_header("cf-mitigated", "challenge"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&scraper(None), &server.uri()).unwrap();

    let err = fetcher.fetch(&format!("{}/challenge", server.uri())).await.unwrap_err();
    assert!(matches!(err, AppError::Blocked { status: 403, challenge: true, .. }));
    assert!(err.needs_session_refresh());

    let err = fetcher.fetch(&format!("{}/forbidden", server.uri())).await.unwrap_err();
    assert!(matches!(err, AppError::Blocked { challenge: false, .. }));
    assert!(!err.needs_session_refresh());
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&scraper(None), &server.uri()).unwrap();
    let err = fetcher.fetch(&format!("{}/cart", server.uri())).await.unwrap_err();

    assert!(matches!(err, AppError::UnexpectedStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_fallback_chain_with_http_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[("JP-1", 0)])))
        .mount(&server)
        .await;

    let http = HttpFetcher::new(&scraper(None), &server.uri()).unwrap();
    let fetcher = FallbackFetcher::new(vec![Box::new(http)]);
    let page = fetcher.fetch(&format!("{}/cart", server.uri())).await.unwrap();

    assert!(page.body.contains("JP-1"));
}
