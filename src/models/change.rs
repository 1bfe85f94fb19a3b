use serde::{Deserialize, Serialize};

use crate::models::ProductRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Listed,
    SoldOut,
    StockChanged,
    Delisted,
    Alert,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Listed => "Listed",
            ChangeKind::SoldOut => "Sold out",
            ChangeKind::StockChanged => "Stock changed",
            ChangeKind::Delisted => "Delisted",
            ChangeKind::Alert => "Alert",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ChangeKind::Listed => "🟢",
            ChangeKind::SoldOut => "🔴",
            ChangeKind::StockChanged => "🟡",
            ChangeKind::Delisted => "⚫",
            ChangeKind::Alert => "⚠️",
        }
    }
}

/// A difference found in one cycle. Consumed by the notifier, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub name: String,
    pub region: String,
    pub old_stock: u32,
    pub new_stock: u32,
    pub product: Option<ProductRecord>,
}

impl ChangeEvent {
    pub fn for_product(kind: ChangeKind, old_stock: u32, product: &ProductRecord) -> Self {
        Self {
            kind,
            name: product.name.clone(),
            region: product.region.clone(),
            old_stock,
            new_stock: product.stock,
            product: Some(product.clone()),
        }
    }

    pub fn delisted(previous: &ProductRecord) -> Self {
        Self {
            kind: ChangeKind::Delisted,
            name: previous.name.clone(),
            region: previous.region.clone(),
            old_stock: previous.stock,
            new_stock: 0,
            product: Some(previous.clone()),
        }
    }

    /// Raised by the poll loop after too many fully failed cycles.
    pub fn alert(failed_cycles: u32) -> Self {
        Self {
            kind: ChangeKind::Alert,
            name: format!("Monitor failed {} consecutive cycles", failed_cycles),
            region: "System".to_string(),
            old_stock: 0,
            new_stock: 0,
            product: None,
        }
    }
}
