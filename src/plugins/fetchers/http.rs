use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ScraperConfig;
use crate::plugins::traits::{FetchedPage, PageFetcher};
use crate::utils::random_user_agent;
use crate::{AppError, Result};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Plain HTTP fetcher with a persistent cookie jar. Cookies set by the origin
/// during warm-up (e.g. `cf_clearance`) are replayed on later requests.
pub struct HttpFetcher {
    client: Client,
    origin: Url,
    accept_language: String,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig, origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| AppError::Validation(format!("Invalid origin '{}': {}", origin, e)))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &config.cookie {
            let names = inject_cookies(&jar, cookie, &origin);
            tracing::info!("Injected storefront cookies: {}", names.join(", "));
        }

        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.request_timeout));

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
            tracing::info!("Using proxy: {}", proxy);
        }

        Ok(Self {
            client: builder.build()?,
            origin,
            accept_language: config.accept_language.clone(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let values = [
            (USER_AGENT, random_user_agent()),
            (ACCEPT, ACCEPT_HTML),
            (ACCEPT_LANGUAGE, self.accept_language.as_str()),
            (REFERER, self.origin.as_str()),
        ];
        for (name, value) in values {
            if let Ok(value) = value.parse::<HeaderValue>() {
                headers.insert(name, value);
            }
        }
        headers
    }

    /// Visits the root origin so the server can hand out session cookies.
    pub async fn prepare_session(&self) -> Result<StatusCode> {
        let response = self
            .client
            .get(self.origin.clone())
            .headers(self.headers())
            .send()
            .await?;
        let status = response.status();
        tracing::info!("Origin warm-up returned {}", status);
        Ok(status)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let start_time = Instant::now();
        let response = self.client.get(url).headers(self.headers()).send().await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN || status == StatusCode::SERVICE_UNAVAILABLE {
            let challenge = is_challenge(response.headers());
            let server = response
                .headers()
                .get("server")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::debug!("{} from {} (server: {}, challenge: {})", status, url, server, challenge);
            return Err(AppError::Blocked {
                status: status.as_u16(),
                url: url.to_string(),
                challenge,
            });
        }

        if !status.is_success() {
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            body,
            strategy: self.name().to_string(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    async fn refresh_session(&self) -> Result<()> {
        self.prepare_session().await.map(|_| ())
    }
}

/// Cloudflare marks its interstitials with `cf-*` headers.
pub fn is_challenge(headers: &HeaderMap) -> bool {
    headers.keys().any(|name| {
        let name = name.as_str();
        name.starts_with("cf-") || name.contains("challenge")
    })
}

/// Splits `k=v; k2=v2` into pairs, skipping fragments without `=`.
pub fn parse_cookie_string(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn inject_cookies(jar: &Jar, cookie: &str, origin: &Url) -> Vec<String> {
    parse_cookie_string(cookie)
        .into_iter()
        .map(|(name, value)| {
            jar.add_cookie_str(&format!("{}={}; Path=/", name, value), origin);
            name
        })
        .collect()
}
