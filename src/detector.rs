use crate::config::{DetectorMode, MonitorConfig};
use crate::models::{ChangeEvent, ChangeKind, ProductRecord, RecordMap};

/// Compares two cycles' record maps and reports at most one event per key.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    mode: DetectorMode,
    members_only: bool,
}

impl ChangeDetector {
    pub fn new(mode: DetectorMode, members_only: bool) -> Self {
        Self { mode, members_only }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        let detector = Self::new(config.mode, config.members_only);
        if detector.ignores_members_only() {
            tracing::warn!("monitor.members_only has no effect in status mode; every listing is reported");
        }
        detector
    }

    /// Status mode reports every listing regardless of `members_only`.
    pub fn ignores_members_only(&self) -> bool {
        self.mode == DetectorMode::Status && self.members_only
    }

    /// Only restricted listings are reported in stock mode with `members_only` set.
    pub fn is_eligible(&self, record: &ProductRecord) -> bool {
        match self.mode {
            DetectorMode::Stock => !self.members_only || record.member_only.is_restricted(),
            DetectorMode::Status => true,
        }
    }

    pub fn diff(&self, previous: &RecordMap, current: &RecordMap) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for (key, record) in current {
            if !self.is_eligible(record) {
                continue;
            }
            let old_stock = previous.get(key).map(|p| p.stock);
            if let Some(kind) = classify(old_stock, record.stock) {
                events.push(ChangeEvent::for_product(kind, old_stock.unwrap_or(0), record));
            }
        }

        if self.mode == DetectorMode::Status {
            for (key, record) in previous {
                if !current.contains_key(key) {
                    events.push(ChangeEvent::delisted(record));
                }
            }
        }

        events
    }
}

/// First matching rule wins; `None` previous means the key was never seen.
pub fn classify(previous: Option<u32>, current: u32) -> Option<ChangeKind> {
    let old = previous.unwrap_or(0);
    if old == 0 && current > 0 {
        Some(ChangeKind::Listed)
    } else if old > 0 && current == 0 {
        Some(ChangeKind::SoldOut)
    } else if old != current {
        Some(ChangeKind::StockChanged)
    } else if previous.is_none() {
        Some(ChangeKind::Listed)
    } else {
        None
    }
}
