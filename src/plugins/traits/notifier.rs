use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::models::{ChangeEvent, ChangeKind};

/// Title/body pair handed to a push gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub skipped: bool,
    pub message_id: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            skipped: false,
            message_id,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: false,
            skipped: true,
            message_id: None,
        }
    }
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn from_change(event: &ChangeEvent) -> Self {
        let title = format!("{} {} - {}", event.kind.emoji(), event.kind.label(), event.region);

        let mut lines = vec![format!("Name: {}", event.name)];
        match event.kind {
            ChangeKind::Alert => {
                lines.push("Every target failed to load; check the network, proxy or cookies.".to_string());
            }
            ChangeKind::StockChanged => {
                lines.push(format!("Stock: {} → {}", event.old_stock, event.new_stock));
            }
            ChangeKind::Delisted => {
                lines.push(format!("Last stock: {}", event.old_stock));
            }
            ChangeKind::Listed | ChangeKind::SoldOut => {
                lines.push(format!("Stock: {}", event.new_stock));
            }
        }

        if let Some(product) = &event.product {
            if product.member_only.is_restricted() {
                lines.push(format!("Requires: {}", product.member_only.display_name()));
            }
            if !product.config.is_empty() {
                lines.push(product.config.clone());
            }
            if let Some(url) = &product.url {
                lines.push(format!("Link: {}", url));
            }
        }

        Self {
            title,
            body: lines.join("\n"),
        }
    }
}

/// A push channel. Delivery failures surface as errors and are never retried by callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult>;
}
