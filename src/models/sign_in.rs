use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInStats {
    #[serde(default)]
    pub total_days: u32,
    #[serde(default)]
    pub consecutive_days: u32,
    #[serde(default)]
    pub max_consecutive_days: u32,
    #[serde(default)]
    pub last_success_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_failure_date: Option<NaiveDate>,
}

impl SignInStats {
    /// Streak continues only when the previous success was exactly yesterday.
    pub fn record_success(&mut self, today: NaiveDate) {
        if self.last_success_date == Some(today) {
            return;
        }

        let continues = self
            .last_success_date
            .and_then(|last| last.succ_opt())
            .is_some_and(|next| next == today);

        self.consecutive_days = if continues { self.consecutive_days + 1 } else { 1 };
        self.max_consecutive_days = self.max_consecutive_days.max(self.consecutive_days);
        self.total_days += 1;
        self.last_success_date = Some(today);
    }

    pub fn record_failure(&mut self, today: NaiveDate) {
        self.last_failure_date = Some(today);
    }
}

/// Result of the last session probe, keyed by target name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieStatus {
    pub last_check: DateTime<Utc>,
    pub status: BTreeMap<String, bool>,
}

impl CookieStatus {
    pub fn invalid_targets(&self) -> Vec<&str> {
        self.status
            .iter()
            .filter(|(_, valid)| !**valid)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
