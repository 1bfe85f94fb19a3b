use chrono::NaiveDate;
use reqwest::Client;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::Arc;

use crate::config::CheckinConfig;
use crate::models::SignInStats;
use crate::plugins::Notifier;
use crate::plugins::traits::Notification;
use crate::store::JsonStore;
use crate::utils::{build_client, random_user_agent};
use crate::Result;

const ALREADY_SIGNED_MARKERS: &[&str] = &["已签到", "already"];
const FAILURE_PHRASES: &[&str] = &["失败", "错误", "error"];
const ERROR_ALERTS: &str = ".alert-danger, .alert-error";
const MESSAGE_BLOCKS: &str = ".alert, .message, .msg, #messagetext";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinOutcome {
    Signed { message: String },
    AlreadySigned { message: String },
    Failed { reason: String },
}

impl CheckinOutcome {
    /// Signed or already signed; both close out the day.
    pub fn is_done_for_today(&self) -> bool {
        !matches!(self, CheckinOutcome::Failed { .. })
    }
}

/// Daily check-in POST with streak bookkeeping.
pub struct CheckinTask {
    client: Client,
    url: String,
    referer: Option<String>,
    cookie: String,
    store: JsonStore,
    notifier: Arc<dyn Notifier>,
}

impl CheckinTask {
    /// Returns `None` when the task is disabled or lacks a URL or cookie.
    pub fn from_config(
        config: &CheckinConfig,
        proxy: Option<&str>,
        store: JsonStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Option<Self>> {
        if !config.enabled {
            tracing::info!("Check-in disabled");
            return Ok(None);
        }

        let url = config.url.as_deref().filter(|u| !u.trim().is_empty());
        let cookie = config.cookie.as_deref().filter(|c| !c.trim().is_empty());
        let (Some(url), Some(cookie)) = (url, cookie) else {
            tracing::info!("Check-in URL or cookie not configured, check-in disabled");
            return Ok(None);
        };

        Ok(Some(Self {
            client: build_client(config.request_timeout, proxy)?,
            url: url.to_string(),
            referer: config.referer.clone(),
            cookie: cookie.to_string(),
            store,
            notifier,
        }))
    }

    /// At most one attempt per calendar day, whatever its outcome.
    pub async fn is_due(&self, today: NaiveDate) -> bool {
        if self.store.load_last_sign_date().await == Some(today) {
            return false;
        }
        self.store.load_stats().await.last_failure_date != Some(today)
    }

    pub async fn run_if_due(&self, today: NaiveDate) -> Option<CheckinOutcome> {
        if !self.is_due(today).await {
            tracing::debug!("Check-in already attempted on {}", today);
            return None;
        }
        Some(self.run(today).await)
    }

    /// One check-in attempt. Never fails; errors become `CheckinOutcome::Failed`.
    pub async fn run(&self, today: NaiveDate) -> CheckinOutcome {
        tracing::info!("Running daily check-in");
        let outcome = match self.submit().await {
            Ok((status, body)) => interpret_response(status, &body),
            Err(e) => CheckinOutcome::Failed { reason: e.to_string() },
        };

        let mut stats = self.store.load_stats().await;
        match &outcome {
            CheckinOutcome::Signed { message } => {
                tracing::info!("Check-in succeeded: {}", message);
                stats.record_success(today);
                self.persist_stats(&stats).await;
            }
            CheckinOutcome::AlreadySigned { message } => {
                tracing::info!("Already checked in today: {}", message);
            }
            CheckinOutcome::Failed { reason } => {
                tracing::warn!("Check-in failed, next attempt tomorrow: {}", reason);
                stats.record_failure(today);
                self.persist_stats(&stats).await;
            }
        }
        if outcome.is_done_for_today() {
            self.persist_date(today).await;
        }

        let notification = summary(&outcome, &stats);
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::error!("Failed to send check-in notification: {}", e);
        }

        outcome
    }

    async fn submit(&self) -> Result<(u16, String)> {
        let mut request = self
            .client
            .post(&self.url)
            .header(COOKIE, &self.cookie)
            .header(USER_AGENT, random_user_agent());
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn persist_stats(&self, stats: &SignInStats) {
        if let Err(e) = self.store.save_stats(stats).await {
            tracing::error!("Failed to save sign-in stats: {}", e);
        }
    }

    async fn persist_date(&self, today: NaiveDate) {
        if let Err(e) = self.store.save_last_sign_date(today).await {
            tracing::error!("Failed to save last sign date: {}", e);
        }
    }
}

/// Classifies a check-in response. JSON bodies are judged by `ret`, `code`
/// or `success`; anything else by its visible alert and message text.
pub fn interpret_response(status: u16, body: &str) -> CheckinOutcome {
    if !(200..300).contains(&status) {
        return CheckinOutcome::Failed {
            reason: format!("HTTP {}", status),
        };
    }

    if let Ok(Value::Object(json)) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("msg")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if is_already_signed(&message) {
            return CheckinOutcome::AlreadySigned { message };
        }

        let succeeded = json.get("ret").and_then(Value::as_i64) == Some(1)
            || json.get("code").and_then(Value::as_i64) == Some(0)
            || json.get("success").and_then(Value::as_bool) == Some(true);

        return if succeeded {
            CheckinOutcome::Signed { message }
        } else if message.is_empty() {
            CheckinOutcome::Failed {
                reason: "rejected without a message".to_string(),
            }
        } else {
            CheckinOutcome::Failed { reason: message }
        };
    }

    interpret_markup(body)
}

fn interpret_markup(body: &str) -> CheckinOutcome {
    let document = Html::parse_document(body);
    // Constant selectors; a failure here is a programming error.
    let error_alerts = Selector::parse(ERROR_ALERTS).expect("valid error alert selector");
    let message_blocks = Selector::parse(MESSAGE_BLOCKS).expect("valid message selector");

    if let Some(alert) = document.select(&error_alerts).next() {
        let text = alert.text().map(str::trim).collect::<Vec<_>>().join(" ");
        return CheckinOutcome::Failed {
            reason: if text.trim().is_empty() {
                "error alert on page".to_string()
            } else {
                text.trim().to_string()
            },
        };
    }

    let messages: Vec<String> = document
        .select(&message_blocks)
        .map(|el| el.text().map(str::trim).collect::<Vec<_>>().join(" "))
        .filter(|text| !text.trim().is_empty())
        .collect();
    let message = if messages.is_empty() {
        visible_text(&document)
    } else {
        messages.join(" ")
    };
    let message = message.trim().to_string();

    if is_already_signed(&message) {
        return CheckinOutcome::AlreadySigned { message };
    }

    let lowered = message.to_lowercase();
    if FAILURE_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return CheckinOutcome::Failed { reason: message };
    }

    CheckinOutcome::Signed { message }
}

/// Text a reader would see; script and style bodies are skipped.
fn visible_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?;
            let parent = parent.value().as_element()?;
            if matches!(parent.name(), "script" | "style" | "noscript") {
                return None;
            }
            Some(text.trim())
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_already_signed(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ALREADY_SIGNED_MARKERS.iter().any(|m| lowered.contains(m))
}

fn summary(outcome: &CheckinOutcome, stats: &SignInStats) -> Notification {
    let (title, detail) = match outcome {
        CheckinOutcome::Signed { message } => ("✅ Check-in succeeded", message.as_str()),
        CheckinOutcome::AlreadySigned { message } => ("ℹ️ Already checked in", message.as_str()),
        CheckinOutcome::Failed { reason } => ("❌ Check-in failed", reason.as_str()),
    };

    let mut lines = Vec::new();
    if !detail.is_empty() {
        lines.push(detail.to_string());
    }
    lines.push(format!("Streak: {} days", stats.consecutive_days));
    lines.push(format!("Best streak: {} days", stats.max_consecutive_days));
    lines.push(format!("Total: {} days", stats.total_days));
    Notification::new(title, lines.join("\n\n"))
}
