use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::Result;
use crate::config::StorageConfig;
use crate::models::{CookieStatus, SignInStats, Snapshot};

/// JSON files on disk. Every write replaces the whole file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    config: StorageConfig,
}

impl JsonStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Missing or unreadable snapshot starts from empty.
    pub async fn load_snapshot(&self) -> Snapshot {
        match read_json::<Snapshot>(&self.config.snapshot_path).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => Snapshot::default(),
            Err(e) => {
                tracing::warn!(
                    "Could not read snapshot {}, starting fresh: {}",
                    self.config.snapshot_path.display(),
                    e
                );
                Snapshot::default()
            }
        }
    }

    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        write_json(&self.config.snapshot_path, snapshot).await
    }

    pub async fn load_stats(&self) -> SignInStats {
        match read_json::<SignInStats>(&self.config.stats_path).await {
            Ok(stats) => stats.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read sign-in stats, starting fresh: {}", e);
                SignInStats::default()
            }
        }
    }

    pub async fn save_stats(&self, stats: &SignInStats) -> Result<()> {
        write_json(&self.config.stats_path, stats).await
    }

    pub async fn load_last_sign_date(&self) -> Option<NaiveDate> {
        let raw = fs::read_to_string(&self.config.last_sign_path).await.ok()?;
        match raw.trim().parse::<NaiveDate>() {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!("Ignoring malformed last sign date '{}': {}", raw.trim(), e);
                None
            }
        }
    }

    pub async fn save_last_sign_date(&self, date: NaiveDate) -> Result<()> {
        write_atomic(&self.config.last_sign_path, date.format("%Y-%m-%d").to_string().as_bytes()).await
    }

    pub async fn load_cookie_status(&self) -> Option<CookieStatus> {
        match read_json::<CookieStatus>(&self.config.cookie_status_path).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Could not read cookie status: {}", e);
                None
            }
        }
    }

    pub async fn save_cookie_status(&self, status: &CookieStatus) -> Result<()> {
        write_json(&self.config.cookie_status_path, status).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&raw)?))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &body).await
}

/// Writes to a sibling temp file and renames it over the target.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
