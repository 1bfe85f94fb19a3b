use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

use crate::checkin::CheckinTask;
use crate::config::{MonitorConfig, Target};
use crate::detector::ChangeDetector;
use crate::models::{ChangeEvent, RecordMap, Snapshot};
use crate::parser::ProductParser;
use crate::plugins::traits::Notification;
use crate::plugins::{Notifier, PageFetcher};
use crate::session::SessionProbe;
use crate::store::JsonStore;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Parsing,
    Diffing,
    Notifying,
    Persisting,
    Sleeping,
}

/// Everything the loop mutates between cycles.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub previous: RecordMap,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_cookie_check: Option<DateTime<Utc>>,
    pub cycles: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub events: Vec<ChangeEvent>,
    pub alert_raised: bool,
    pub persisted: bool,
}

impl CycleReport {
    /// A cycle counts as successful when any target loaded.
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

pub struct PollLoop {
    config: MonitorConfig,
    fetcher: Box<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    parser: ProductParser,
    detector: ChangeDetector,
    store: JsonStore,
    checkin: Option<CheckinTask>,
    session: Option<SessionProbe>,
    state: LoopState,
}

impl PollLoop {
    pub fn new(
        config: MonitorConfig,
        fetcher: Box<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        store: JsonStore,
    ) -> Self {
        Self {
            detector: ChangeDetector::from_config(&config),
            parser: ProductParser::new(),
            config,
            fetcher,
            notifier,
            store,
            checkin: None,
            session: None,
            state: LoopState::default(),
        }
    }

    pub fn with_checkin(mut self, task: Option<CheckinTask>) -> Self {
        self.checkin = task;
        self
    }

    pub fn with_session_probe(mut self, probe: Option<SessionProbe>) -> Self {
        self.session = probe;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Seeds the previous snapshot and the session gate from disk.
    pub async fn load_state(&mut self) {
        let snapshot = self.store.load_snapshot().await;
        self.state.previous = snapshot.flatten();
        self.state.last_cookie_check = self.store.load_cookie_status().await.map(|s| s.last_check);
        tracing::info!(
            "Loaded {} products across {} regions from previous snapshot",
            self.state.previous.len(),
            snapshot.regions().count()
        );
    }

    /// Polls forever. Callers stop it by dropping the future.
    pub async fn run(&mut self) {
        tracing::info!(
            "Stock monitor started: {} targets every {}s",
            self.config.targets.len(),
            self.config.interval_secs
        );

        loop {
            let report = self.run_cycle().await;
            let delay = self.sleep_duration();
            tracing::debug!(
                phase = ?CyclePhase::Sleeping,
                success = report.is_success(),
                "Next cycle in {}s",
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state.cycles += 1;
        metrics::counter!("watcher_cycles_total").increment(1);
        tracing::debug!(phase = ?CyclePhase::Idle, "Cycle {} starting", self.state.cycles);

        self.run_due_tasks().await;

        let mut report = CycleReport::default();
        let mut current = RecordMap::new();

        tracing::debug!(phase = ?CyclePhase::Fetching, "Fetching {} targets", self.config.targets.len());
        for target in &self.config.targets {
            match self.fetch_target(target).await {
                Ok(products) => {
                    current.extend(products);
                    report.succeeded.push(target.region.clone());
                }
                Err(e) => {
                    tracing::error!("[{}] Giving up after {} attempts: {}", target.region, self.config.retry_attempts, e);
                    report.failed.push(target.region.clone());
                }
            }
        }

        tracing::info!(
            "Cycle {}: {}/{} targets loaded",
            self.state.cycles,
            report.succeeded.len(),
            self.config.targets.len()
        );

        if !report.is_success() {
            self.record_failed_cycle(&mut report).await;
            return report;
        }

        if self.state.consecutive_failures > 0 {
            let stale = self
                .state
                .last_success_at
                .map(|at| (Utc::now() - at).num_seconds())
                .unwrap_or_default();
            tracing::info!(
                "Recovered after {} failed cycles; last good snapshot was {}s old",
                self.state.consecutive_failures,
                stale
            );
        }
        self.state.consecutive_failures = 0;

        // Failed regions keep their last known records.
        for (key, record) in &self.state.previous {
            if report.failed.contains(&record.region) {
                current.entry(key.clone()).or_insert_with(|| record.clone());
            }
        }

        tracing::debug!(phase = ?CyclePhase::Diffing, "Diffing {} records", current.len());
        let events = self.detector.diff(&self.state.previous, &current);
        metrics::counter!("watcher_events_total").increment(events.len() as u64);

        tracing::debug!(phase = ?CyclePhase::Notifying, "{} changes", events.len());
        for event in &events {
            tracing::info!(
                "{} {}: {} ({} -> {})",
                event.kind.label(),
                event.region,
                event.name,
                event.old_stock,
                event.new_stock
            );
            self.deliver(&Notification::from_change(event)).await;
        }

        tracing::debug!(phase = ?CyclePhase::Persisting, "Saving snapshot");
        match self.store.save_snapshot(&Snapshot::from_records(current.values())).await {
            Ok(()) => report.persisted = true,
            Err(e) => tracing::error!("Failed to save snapshot: {}", e),
        }

        self.state.previous = current;
        self.state.last_success_at = Some(Utc::now());
        report.events = events;
        report
    }

    async fn record_failed_cycle(&mut self, report: &mut CycleReport) {
        self.state.consecutive_failures += 1;
        metrics::counter!("watcher_cycle_failures_total").increment(1);
        tracing::warn!(
            "Every target failed ({} consecutive cycles)",
            self.state.consecutive_failures
        );

        if self.state.consecutive_failures >= self.config.failure_alert_threshold {
            let alert = ChangeEvent::alert(self.state.consecutive_failures);
            tracing::warn!("{}", alert.name);
            self.deliver(&Notification::from_change(&alert)).await;
            report.alert_raised = true;
            self.state.consecutive_failures = 0;
        }
    }

    async fn run_due_tasks(&mut self) {
        if let Some(task) = &self.checkin {
            task.run_if_due(Local::now().date_naive()).await;
        }

        if let Some(probe) = &self.session {
            let now = Utc::now();
            if probe.is_due(self.state.last_cookie_check, now) {
                let status = probe.check(now).await;
                self.state.last_cookie_check = Some(status.last_check);
            }
        }
    }

    /// Fetch and parse one target with fixed-delay retries.
    async fn fetch_target(&self, target: &Target) -> Result<RecordMap> {
        let retries = self.config.retry_attempts.max(1) as usize - 1;
        let strategy = FixedInterval::from_millis(self.config.retry_delay_ms).take(retries);
        let mut attempt = 0u32;

        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                let attempt = attempt;
                async move {
                    let result = self.fetch_once(target).await;
                    if let Err(e) = &result {
                        tracing::warn!("[{}] Attempt {} failed: {}", target.region, attempt, e);
                        if e.needs_session_refresh() {
                            tracing::info!("[{}] Challenge detected, refreshing session", target.region);
                            if let Err(refresh_err) = self.fetcher.refresh_session().await {
                                tracing::warn!("Session refresh failed: {}", refresh_err);
                            }
                        }
                    }
                    result
                }
            },
            |e: &AppError| e.is_transient(),
        )
        .await
    }

    async fn fetch_once(&self, target: &Target) -> Result<RecordMap> {
        let page = self.fetcher.fetch(&target.url).await?;
        tracing::debug!(
            phase = ?CyclePhase::Parsing,
            "[{}] {} bytes via {} in {}ms",
            target.region,
            page.body.len(),
            page.strategy,
            page.response_time_ms
        );

        let products = self.parser.parse(&page.body, &target.url, &target.region);
        if products.is_empty() {
            return Err(AppError::EmptyPage {
                url: target.url.clone(),
            });
        }

        tracing::info!("[{}] Parsed {} products", target.region, products.len());
        Ok(products)
    }

    /// Delivery failures are logged and never retried.
    async fn deliver(&self, notification: &Notification) -> bool {
        match self.notifier.notify(notification).await {
            Ok(result) => result.success,
            Err(e) => {
                metrics::counter!("watcher_notifications_failed_total").increment(1);
                tracing::error!("Failed to send '{}': {}", notification.title, e);
                false
            }
        }
    }

    fn sleep_duration(&self) -> Duration {
        let jitter = match self.config.interval_jitter_secs {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };
        Duration::from_secs(self.config.interval_secs + jitter)
    }
}
