use restock_watcher::config::{DetectorMode, MonitorConfig, ScraperConfig, Target};
use restock_watcher::plugins::Notifier;
use restock_watcher::plugins::fetchers::HttpFetcher;
use restock_watcher::plugins::notifiers::ServerChanNotifier;
use restock_watcher::scheduler::PollLoop;
use restock_watcher::store::JsonStore;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{PUSH_KEY, bodies_for, expect_pushes, listing_html, serverchan_for, storage_in};

fn monitor(server: &MockServer, mode: DetectorMode) -> MonitorConfig {
    MonitorConfig {
        origin: server.uri(),
        targets: vec![
            Target {
                region: "白银区".to_string(),
                url: format!("{}/cart?fid=1&gid=1", server.uri()),
            },
            Target {
                region: "黄金区".to_string(),
                url: format!("{}/cart?fid=1&gid=2", server.uri()),
            },
        ],
        retry_attempts: 3,
        retry_delay_ms: 0,
        mode,
        ..MonitorConfig::default()
    }
}

fn poll_loop(server: &MockServer, dir: &TempDir, mode: DetectorMode) -> (PollLoop, JsonStore) {
    let scraper = ScraperConfig {
        request_timeout: 5,
        ..ScraperConfig::default()
    };
    let fetcher = HttpFetcher::new(&scraper, &server.uri()).unwrap();
    let notifier: Arc<dyn Notifier> = Arc::new(ServerChanNotifier::new(&serverchan_for(server)).unwrap());
    let store = JsonStore::new(storage_in(dir));
    let poll = PollLoop::new(monitor(server, mode), Box::new(fetcher), notifier, store.clone());
    (poll, store)
}

async fn mount_listing(server: &MockServer, gid: &str, cards: &[(&str, u32)]) {
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(query_param("gid", gid))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(cards)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_restock_is_pushed_and_persisted() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, "1", &[("HK-1", 0)]).await;
    mount_listing(&server, "2", &[("JP-1", 2)]).await;

    let (mut poll, store) = poll_loop(&server, &dir, DetectorMode::Stock);
    expect_pushes(&server, 2).await;
    let first = poll.run_cycle().await;
    assert_eq!(first.events.len(), 2);
    assert!(first.persisted);

    server.reset().await;
    mount_listing(&server, "1", &[("HK-1", 4)]).await;
    mount_listing(&server, "2", &[("JP-1", 2)]).await;
    expect_pushes(&server, 1).await;

    let second = poll.run_cycle().await;
    assert_eq!(second.events.len(), 1);
    assert_eq!(second.events[0].name, "HK-1");

    let pushes = bodies_for(&server, &format!("/{}.send", PUSH_KEY)).await;
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].contains("Listed - 白银区"));
    assert!(pushes[0].contains("Requires: Silver"));

    let saved = store.load_snapshot().await;
    assert_eq!(saved.len(), 2);
    assert_eq!(saved.flatten()["白银区 - HK-1"].stock, 4);
}

#[tokio::test]
async fn test_empty_page_is_retried_then_region_carried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, "1", &[("HK-1", 1)]).await;
    mount_listing(&server, "2", &[("JP-1", 1)]).await;
    expect_pushes(&server, 2).await;

    let (mut poll, _store) = poll_loop(&server, &dir, DetectorMode::Status);
    poll.run_cycle().await;

    server.reset().await;
    mount_listing(&server, "1", &[("HK-1", 1)]).await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(query_param("gid", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .expect(3)
        .mount(&server)
        .await;
    expect_pushes(&server, 0).await;

    let report = poll.run_cycle().await;
    assert!(report.is_success());
    assert_eq!(report.failed, vec!["黄金区"]);
    assert!(report.events.is_empty());
    assert_eq!(poll.state().previous.len(), 2);
}

#[tokio::test]
async fn test_outage_keeps_last_good_snapshot() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, "1", &[("HK-1", 3)]).await;
    mount_listing(&server, "2", &[("JP-1", 3)]).await;
    expect_pushes(&server, 2).await;

    let (mut poll, store) = poll_loop(&server, &dir, DetectorMode::Stock);
    poll.run_cycle().await;
    let before = store.load_snapshot().await;

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = poll.run_cycle().await;
    assert!(!report.is_success());
    assert_eq!(poll.state().consecutive_failures, 1);
    assert_eq!(store.load_snapshot().await, before);
    assert_eq!(poll.state().previous.len(), 2);
}
