use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ServerChanConfig;
use crate::plugins::traits::{Notification, NotificationResult, Notifier};
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct ServerChanResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ServerChanData>,
}

#[derive(Debug, Deserialize)]
struct ServerChanData {
    #[serde(default)]
    pushid: Option<serde_json::Value>,
}

/// Posts `title`/`desp` form fields to the ServerChan push endpoint.
pub struct ServerChanNotifier {
    client: Client,
    key: Option<String>,
    endpoint: String,
}

impl ServerChanNotifier {
    pub fn new(config: &ServerChanConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            key: config
                .sckey
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            endpoint: config.endpoint.clone(),
        })
    }

    fn send_url(&self, key: &str) -> String {
        self.endpoint.replace("{key}", key)
    }
}

#[async_trait]
impl Notifier for ServerChanNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult> {
        let Some(key) = &self.key else {
            tracing::info!("Push key not configured, skipping notification: {}", notification.title);
            return Ok(NotificationResult::skipped());
        };

        let response = self
            .client
            .post(self.send_url(key))
            .form(&[
                ("title", notification.title.as_str()),
                ("desp", notification.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != StatusCode::OK {
            return Err(AppError::Notification(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let body: ServerChanResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Notification(format!("Unreadable response ({}): {}", e, text)))?;
        if body.code != 0 {
            return Err(AppError::Notification(format!(
                "code {}: {}",
                body.code,
                body.message.unwrap_or_default()
            )));
        }

        let message_id = body
            .data
            .and_then(|d| d.pushid)
            .map(|id| match id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });

        tracing::info!("Push sent: {}", notification.title);
        Ok(NotificationResult::delivered(message_id))
    }
}
