use serde::{Deserialize, Serialize};
use crate::models::{MemberTier, ProductStatus};

/// One listing card as seen in a single poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,

    // Requirements and description
    #[serde(default)]
    pub member_only: MemberTier,
    #[serde(default)]
    pub config: String,

    // Links
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pid: Option<String>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, region: impl Into<String>, stock: u32) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            stock,
            status: Some(ProductStatus::from_stock(stock)),
            member_only: MemberTier::None,
            config: String::new(),
            url: None,
            pid: None,
        }
    }

    pub fn with_tier(mut self, tier: MemberTier) -> Self {
        self.member_only = tier;
        self
    }

    /// Identity of a record: the name qualified by its region.
    pub fn key(&self) -> String {
        record_key(&self.region, &self.name)
    }
}

pub fn record_key(region: &str, name: &str) -> String {
    format!("{} - {}", region, name)
}

impl ProductStatus {
    pub fn from_stock(stock: u32) -> Self {
        if stock > 0 {
            ProductStatus::OnSale
        } else {
            ProductStatus::SoldOut
        }
    }
}
