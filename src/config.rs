use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationsConfig,
    pub checkin: CheckinConfig,
    pub session: SessionConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub region: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// Diff stock counts; delisted cards are not reported.
    #[default]
    Stock,
    /// Diff stock and report cards that disappear.
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub origin: String,
    pub targets: Vec<Target>,
    pub interval_secs: u64,
    pub interval_jitter_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub failure_alert_threshold: u32,
    pub members_only: bool,
    pub mode: DetectorMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub request_timeout: u64,
    pub cookie: Option<String>,
    pub proxy: Option<String>,
    pub accept_language: String,
    pub browser_fallback: bool,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: PathBuf,
    pub stats_path: PathBuf,
    pub last_sign_path: PathBuf,
    pub cookie_status_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub serverchan: ServerChanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerChanConfig {
    pub sckey: Option<String>,
    /// Endpoint template; `{key}` is replaced with the push key.
    pub endpoint: String,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub referer: Option<String>,
    pub cookie: Option<String>,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub storefront_path: String,
    pub checkin_probe_url: Option<String>,
    pub logged_in_markers: Vec<String>,
    pub logged_out_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let origin = "https://www.mjjvm.com";
        let targets = [
            ("白银区", 1),
            ("黄金区", 2),
            ("钻石区", 3),
            ("星耀区", 4),
            ("特别活动区", 6),
        ]
        .into_iter()
        .map(|(region, gid)| Target {
            region: region.to_string(),
            url: format!("{}/cart?fid=1&gid={}", origin, gid),
        })
        .collect();

        Self {
            origin: origin.to_string(),
            targets,
            interval_secs: 60,
            interval_jitter_secs: 0,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            failure_alert_threshold: 10,
            members_only: true,
            mode: DetectorMode::Stock,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: 20,
            cookie: None,
            proxy: None,
            accept_language: "zh-CN,zh;q=0.9".to_string(),
            browser_fallback: false,
            chrome_path: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("stock_data.json"),
            stats_path: PathBuf::from("sign_stats.json"),
            last_sign_path: PathBuf::from("last_sign_date.txt"),
            cookie_status_path: PathBuf::from("cookie_status.json"),
            log_dir: PathBuf::from("logs"),
            log_file: "stock_out.log".to_string(),
        }
    }
}

impl Default for ServerChanConfig {
    fn default() -> Self {
        Self {
            sckey: None,
            endpoint: "https://sctapi.ftqq.com/{key}.send".to_string(),
            request_timeout: 10,
        }
    }
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            referer: None,
            cookie: None,
            request_timeout: 20,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 14400,
            storefront_path: "/clientarea".to_string(),
            checkin_probe_url: None,
            logged_in_markers: vec![
                "退出登录".to_string(),
                "注销".to_string(),
                "logout".to_string(),
            ],
            logged_out_markers: vec![
                "请登录".to_string(),
                "忘记密码".to_string(),
                "name=\"password\"".to_string(),
            ],
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

/// Flat variables accepted for compatibility with plain `.env` files.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("SCKEY", "notifications.serverchan.sckey"),
    ("MJJVM_COOKIE", "scraper.cookie"),
    ("PROXY", "scraper.proxy"),
    ("CHROME_PATH", "scraper.chrome_path"),
    ("INTERVAL", "monitor.interval_secs"),
    ("SIGN_URL", "checkin.url"),
    ("SIGN_COOKIE", "checkin.cookie"),
    ("COOKIE_CHECK_INTERVAL", "session.interval_secs"),
];

impl AppConfig {
    /// Layers: built-in defaults, config files, `WATCHER__*` variables, then flat legacy keys.
    /// An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(ConfigError::Message(format!("Failed to read .env: {}", e)));
            }
        }

        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("WATCHER").separator("__"));

        for (var, key) in LEGACY_KEYS {
            let value = env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Monitor
        if self.monitor.targets.is_empty() {
            return Err(ConfigError::Message("At least one monitor target is required".into()));
        }

        if Url::parse(&self.monitor.origin).is_err() {
            return Err(ConfigError::Message("Invalid monitor origin URL".into()));
        }

        for target in &self.monitor.targets {
            if Url::parse(&target.url).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid URL for target '{}': {}",
                    target.region, target.url
                )));
            }
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Message("Monitor interval_secs must be greater than 0".into()));
        }

        if self.monitor.retry_attempts == 0 {
            return Err(ConfigError::Message("Monitor retry_attempts must be greater than 0".into()));
        }

        if self.monitor.failure_alert_threshold == 0 {
            return Err(ConfigError::Message(
                "Monitor failure_alert_threshold must be greater than 0".into(),
            ));
        }

        // Scraper
        if let Some(proxy) = &self.scraper.proxy {
            if Url::parse(proxy).is_err() {
                return Err(ConfigError::Message("Invalid proxy URL".into()));
            }
        }

        // Notifications
        if !self.notifications.serverchan.endpoint.contains("{key}") {
            return Err(ConfigError::Message(
                "ServerChan endpoint must contain a {key} placeholder".into(),
            ));
        }

        // Check-in
        if let Some(url) = &self.checkin.url {
            if Url::parse(url).is_err() {
                return Err(ConfigError::Message("Invalid check-in URL".into()));
            }
        }

        // Session probe
        if self.session.enabled && self.session.interval_secs == 0 {
            return Err(ConfigError::Message("Session interval_secs must be greater than 0".into()));
        }

        // Metrics
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn push_key(&self) -> Option<&str> {
        self.notifications
            .serverchan
            .sckey
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
