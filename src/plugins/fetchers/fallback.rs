use async_trait::async_trait;

use crate::config::{MonitorConfig, ScraperConfig};
use crate::plugins::fetchers::{BrowserFetcher, HttpFetcher};
use crate::plugins::traits::{FetchedPage, PageFetcher};
use crate::{AppError, Result};

/// Tries each strategy in order and returns the first page that loads.
pub struct FallbackFetcher {
    strategies: Vec<Box<dyn PageFetcher>>,
}

impl FallbackFetcher {
    pub fn new(strategies: Vec<Box<dyn PageFetcher>>) -> Self {
        Self { strategies }
    }

    /// HTTP first, then headless Chrome when enabled.
    pub fn from_config(scraper: &ScraperConfig, monitor: &MonitorConfig) -> Result<Self> {
        let mut strategies: Vec<Box<dyn PageFetcher>> = vec![Box::new(HttpFetcher::new(scraper, &monitor.origin)?)];
        if scraper.browser_fallback {
            strategies.push(Box::new(BrowserFetcher::new(scraper)));
        }
        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl PageFetcher for FallbackFetcher {
    fn name(&self) -> &'static str {
        "fallback"
    }

    /// When every strategy fails, a challenge error outranks later failures so
    /// the caller still sees that the session needs refreshing.
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut challenge = None;
        let mut last_error = None;
        for strategy in &self.strategies {
            match strategy.fetch(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    tracing::debug!("Strategy '{}' failed for {}: {}", strategy.name(), url, e);
                    if challenge.is_none() && e.needs_session_refresh() {
                        challenge = Some(e);
                    } else {
                        last_error = Some(e);
                    }
                }
            }
        }
        Err(challenge
            .or(last_error)
            .unwrap_or_else(|| AppError::Internal("No fetch strategies configured".to_string())))
    }

    async fn refresh_session(&self) -> Result<()> {
        for strategy in &self.strategies {
            if let Err(e) = strategy.refresh_session().await {
                tracing::warn!("Session refresh failed for '{}': {}", strategy.name(), e);
            }
        }
        Ok(())
    }
}
