use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub strategy: String,
    pub response_time_ms: u64,
}

/// Retrieves raw listing HTML. Implementations decide how (plain HTTP,
/// session warm-up, browser rendering).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// Re-establishes the session after a challenge block.
    async fn refresh_session(&self) -> Result<()> {
        Ok(())
    }
}
