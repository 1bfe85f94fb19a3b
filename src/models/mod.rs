use serde::{Deserialize, Serialize};

pub mod change;
pub mod product;
pub mod sign_in;
pub mod snapshot;

// Re-exports for convenience
pub use change::*;
pub use product::*;
pub use sign_in::*;
pub use snapshot::*;

// Common enums used across models

/// Membership level a listing is restricted to. Stored as its integer rank.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum MemberTier {
    #[default]
    None,
    Community,
    Silver,
    Gold,
    Diamond,
    Star,
}

impl MemberTier {
    pub fn is_restricted(self) -> bool {
        self != MemberTier::None
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MemberTier::None => "Anyone",
            MemberTier::Community => "Community member",
            MemberTier::Silver => "Silver member",
            MemberTier::Gold => "Gold member",
            MemberTier::Diamond => "Diamond member",
            MemberTier::Star => "Star member",
        }
    }
}

impl TryFrom<u8> for MemberTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MemberTier::None),
            1 => Ok(MemberTier::Community),
            2 => Ok(MemberTier::Silver),
            3 => Ok(MemberTier::Gold),
            4 => Ok(MemberTier::Diamond),
            5 => Ok(MemberTier::Star),
            other => Err(format!("unknown member tier {}", other)),
        }
    }
}

impl From<MemberTier> for u8 {
    fn from(tier: MemberTier) -> Self {
        match tier {
            MemberTier::None => 0,
            MemberTier::Community => 1,
            MemberTier::Silver => 2,
            MemberTier::Gold => 3,
            MemberTier::Diamond => 4,
            MemberTier::Star => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    OnSale,
    SoldOut,
}
