use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use reqwest::header::{COOKIE, USER_AGENT};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::CookieStatus;
use crate::plugins::Notifier;
use crate::plugins::traits::Notification;
use crate::store::JsonStore;
use crate::utils::{build_client, random_user_agent};
use crate::Result;

/// One cookie and the page that reveals whether it is still logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub name: String,
    pub probe_url: String,
    pub cookie: String,
}

pub struct SessionProbe {
    client: Client,
    targets: Vec<SessionTarget>,
    logged_in_markers: Vec<String>,
    logged_out_markers: Vec<String>,
    interval: Duration,
    store: JsonStore,
    notifier: Arc<dyn Notifier>,
}

impl SessionProbe {
    pub fn new(
        client: Client,
        targets: Vec<SessionTarget>,
        config: &crate::config::SessionConfig,
        store: JsonStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            targets,
            logged_in_markers: config.logged_in_markers.clone(),
            logged_out_markers: config.logged_out_markers.clone(),
            interval: Duration::seconds(config.interval_secs as i64),
            store,
            notifier,
        }
    }

    /// Builds the storefront and check-in targets that have both a cookie and
    /// a probe URL. `None` when disabled or nothing is tracked.
    pub fn from_config(config: &AppConfig, store: JsonStore, notifier: Arc<dyn Notifier>) -> Result<Option<Self>> {
        if !config.session.enabled {
            tracing::info!("Session probe disabled");
            return Ok(None);
        }

        let targets = session_targets(config);
        if targets.is_empty() {
            tracing::info!("No session cookies configured, session probe disabled");
            return Ok(None);
        }

        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        tracing::info!("Session probe tracking: {}", names.join(", "));

        let client = build_client(config.scraper.request_timeout, config.scraper.proxy.as_deref())?;
        Ok(Some(Self::new(client, targets, &config.session, store, notifier)))
    }

    pub fn targets(&self) -> &[SessionTarget] {
        &self.targets
    }

    pub fn is_due(&self, last_check: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_check {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    /// Probes every target, persists the result, and notifies once when any
    /// session has expired.
    pub async fn check(&self, now: DateTime<Utc>) -> CookieStatus {
        let mut status = BTreeMap::new();
        for target in &self.targets {
            let valid = self.probe(target).await;
            tracing::info!("Session '{}' valid: {}", target.name, valid);
            status.insert(target.name.clone(), valid);
        }

        let result = CookieStatus {
            last_check: now,
            status,
        };

        if let Err(e) = self.store.save_cookie_status(&result).await {
            tracing::error!("Failed to save cookie status: {}", e);
        }

        let invalid = result.invalid_targets();
        if !invalid.is_empty() {
            tracing::warn!("Expired sessions: {}", invalid.join(", "));
            let notification = Notification::new(
                "⚠️ Session expired",
                format!(
                    "These cookies are no longer logged in and need refreshing:\n\n{}",
                    invalid.join("\n\n")
                ),
            );
            if let Err(e) = self.notifier.notify(&notification).await {
                tracing::error!("Failed to send session notification: {}", e);
            }
        }

        result
    }

    async fn probe(&self, target: &SessionTarget) -> bool {
        let response = self
            .client
            .get(&target.probe_url)
            .header(COOKIE, &target.cookie)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Session probe for '{}' failed: {}", target.name, e);
                return false;
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify_session(status, &body, &self.logged_in_markers, &self.logged_out_markers),
            Err(e) => {
                tracing::warn!("Could not read session probe body for '{}': {}", target.name, e);
                false
            }
        }
    }
}

fn session_targets(config: &AppConfig) -> Vec<SessionTarget> {
    let mut targets = Vec::new();

    if let Some(cookie) = non_blank(config.scraper.cookie.as_deref()) {
        targets.push(SessionTarget {
            name: "storefront".to_string(),
            probe_url: format!(
                "{}{}",
                config.monitor.origin.trim_end_matches('/'),
                config.session.storefront_path
            ),
            cookie: cookie.to_string(),
        });
    }

    let checkin_cookie = non_blank(config.checkin.cookie.as_deref());
    let checkin_url = non_blank(config.session.checkin_probe_url.as_deref());
    if let (Some(cookie), Some(url)) = (checkin_cookie, checkin_url) {
        targets.push(SessionTarget {
            name: "checkin".to_string(),
            probe_url: url.to_string(),
            cookie: cookie.to_string(),
        });
    }

    targets
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Logged in iff 2xx, some logged-in marker present and no logged-out marker.
pub fn classify_session(status: u16, body: &str, logged_in: &[String], logged_out: &[String]) -> bool {
    if !(200..300).contains(&status) {
        return false;
    }
    let has_login = logged_in.iter().any(|m| body.contains(m.as_str()));
    let has_logout = logged_out.iter().any(|m| body.contains(m.as_str()));
    has_login && !has_logout
}
