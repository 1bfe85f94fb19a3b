// Shared fixtures for integration tests

pub mod checkin_tests;
pub mod fetcher_tests;
pub mod notifier_tests;
pub mod poll_loop_tests;

use restock_watcher::config::{ServerChanConfig, StorageConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUSH_KEY: &str = "SCTTEST";

/// Every storage file inside `dir`.
pub fn storage_in(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        snapshot_path: dir.path().join("stock_data.json"),
        stats_path: dir.path().join("sign_stats.json"),
        last_sign_path: dir.path().join("last_sign_date.txt"),
        cookie_status_path: dir.path().join("cookie_status.json"),
        log_dir: dir.path().join("logs"),
        ..StorageConfig::default()
    }
}

/// Push gateway pointed at the mock server.
pub fn serverchan_for(server: &MockServer) -> ServerChanConfig {
    ServerChanConfig {
        sckey: Some(PUSH_KEY.to_string()),
        endpoint: format!("{}/{{key}}.send", server.uri()),
        request_timeout: 5,
    }
}

/// Mounts a push endpoint that accepts exactly `times` messages.
pub async fn expect_pushes(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}.send", PUSH_KEY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "",
            "data": { "pushid": "1001" }
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Listing page with one card per `(name, stock)`.
pub fn listing_html(cards: &[(&str, u32)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(name, stock)| {
            format!(
                r#"<div class="card cartitem">
                     <div class="card-body">
                       <h4>{name}</h4>
                       <ul class="vps-config"><li>1 vCPU</li><li>白银会员</li></ul>
                       <p class="card-text">库存：{stock}</p>
                     </div>
                     <div class="card-footer"><a href="/cart?a=add&pid=9">Order</a></div>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"row\">{}</div></body></html>", cards)
}

/// Decoded request bodies the mock server received on `route`.
pub async fn bodies_for(server: &MockServer, route: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| {
            url::form_urlencoded::parse(&r.body)
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&")
        })
        .collect()
}
