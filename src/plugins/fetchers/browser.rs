use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::plugins::traits::{FetchedPage, PageFetcher};
use crate::utils::random_user_agent;
use crate::{AppError, Result};

/// Renders the page in headless Chrome. A browser is launched per fetch and
/// dropped before `fetch` returns, so no Chrome process outlives a cycle.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    chrome_path: Option<PathBuf>,
    cookie: Option<String>,
    accept_language: String,
    timeout: Duration,
    wait_for_selector: Option<String>,
}

impl BrowserFetcher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            cookie: config.cookie.clone(),
            accept_language: config.accept_language.clone(),
            timeout: Duration::from_secs(config.request_timeout),
            wait_for_selector: Some("div.card".to_string()),
        }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(self.timeout * 2)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        Ok(launch_options)
    }

    /// Blocking render; the browser is dropped on every return path.
    fn render(&self, url: &str) -> Result<String> {
        let browser = Browser::new(self.launch_options()?)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.timeout);

        tab.set_user_agent(random_user_agent(), Some(&self.accept_language), None)
            .map_err(|e| AppError::Browser(format!("Failed to set user agent: {}", e)))?;

        if let Some(cookie) = &self.cookie {
            let mut headers = HashMap::new();
            headers.insert("Cookie", cookie.as_str());
            tab.set_extra_http_headers(headers)
                .map_err(|e| AppError::Browser(format!("Failed to set cookie header: {}", e)))?;
        }

        tab.navigate_to(url)
            .map_err(|e| AppError::Browser(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| AppError::Browser(format!("Page load failed: {}", e)))?;

        // Challenge pages swap themselves out; a missing card is reported by the parser.
        if let Some(selector) = &self.wait_for_selector {
            if let Err(e) = tab.wait_for_element_with_custom_timeout(selector, self.timeout) {
                tracing::debug!("Selector '{}' did not appear on {}: {}", selector, url, e);
            }
        }

        let content = tab
            .get_content()
            .map_err(|e| AppError::Browser(format!("Failed to get page content: {}", e)))?;

        // Close tab to free resources
        let _ = tab.close(true);
        Ok(content)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let start_time = Instant::now();
        let fetcher = self.clone();
        let target = url.to_string();

        let body = tokio::task::spawn_blocking(move || fetcher.render(&target))
            .await
            .map_err(|e| AppError::Internal(format!("Browser task failed: {}", e)))??;

        Ok(FetchedPage {
            url: url.to_string(),
            status: 200,
            body,
            strategy: self.name().to_string(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
