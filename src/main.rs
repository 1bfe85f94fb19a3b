use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use restock_watcher::AppConfig;
use restock_watcher::checkin::{CheckinOutcome, CheckinTask};
use restock_watcher::config::{MetricsConfig, StorageConfig};
use restock_watcher::plugins::fetchers::FallbackFetcher;
use restock_watcher::plugins::notifiers::ServerChanNotifier;
use restock_watcher::plugins::traits::Notification;
use restock_watcher::plugins::{Notifier, PageFetcher};
use restock_watcher::scheduler::PollLoop;
use restock_watcher::session::SessionProbe;
use restock_watcher::store::JsonStore;

#[derive(Parser, Debug)]
#[command(name = "restock-watcher", version, about = "Storefront restock monitor with push notifications")]
struct Cli {
    /// Send one test notification and exit
    #[arg(long)]
    test: bool,

    /// Run the check-in once, ignoring the daily gate, and exit
    #[arg(long)]
    sign_test: bool,

    /// Probe the configured session cookies once and exit
    #[arg(long)]
    cookie_test: bool,

    /// TOML configuration file (must exist)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = init_tracing(&config.storage)?;
    init_metrics(&config.metrics)?;

    info!("Starting restock-watcher {}", env!("CARGO_PKG_VERSION"));

    let store = JsonStore::new(config.storage.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(ServerChanNotifier::new(&config.notifications.serverchan)?);

    if cli.test {
        if config.push_key().is_none() {
            bail!("No push key configured; set SCKEY or notifications.serverchan.sckey");
        }
        let notification = Notification::new(
            "🧪 Test notification",
            format!(
                "restock-watcher is configured and watching {} targets.",
                config.monitor.targets.len()
            ),
        );
        let result = notifier.notify(&notification).await?;
        info!("Test notification sent (push id: {:?})", result.message_id);
        return Ok(());
    }

    let proxy = config.scraper.proxy.as_deref();
    let checkin = CheckinTask::from_config(&config.checkin, proxy, store.clone(), Arc::clone(&notifier))?;
    let session = SessionProbe::from_config(&config, store.clone(), Arc::clone(&notifier))?;

    if cli.sign_test {
        let Some(task) = checkin else {
            bail!("Check-in is not configured; set checkin.url and checkin.cookie");
        };
        return match task.run(Local::now().date_naive()).await {
            CheckinOutcome::Failed { reason } => bail!("Check-in failed: {}", reason),
            outcome => {
                info!("Check-in result: {:?}", outcome);
                Ok(())
            }
        };
    }

    if cli.cookie_test {
        let Some(probe) = session else {
            bail!("No session cookies configured to probe");
        };
        let status = probe.check(Utc::now()).await;
        for (target, valid) in &status.status {
            info!("{}: {}", target, if *valid { "logged in" } else { "expired" });
        }
        return Ok(());
    }

    if config.push_key().is_none() {
        warn!("No push key configured; changes will only be logged");
    }

    let fetcher = FallbackFetcher::from_config(&config.scraper, &config.monitor)?;
    info!("Fetch strategies: {}", fetcher.strategy_names().join(" -> "));
    if let Err(e) = fetcher.refresh_session().await {
        warn!("Initial session warm-up failed: {}", e);
    }

    let mut poll_loop = PollLoop::new(config.monitor.clone(), Box::new(fetcher), notifier, store)
        .with_checkin(checkin)
        .with_session_probe(session);
    poll_loop.load_state().await;

    tokio::select! {
        _ = poll_loop.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
        }
    }

    Ok(())
}

/// Stdout plus a daily-rolling log file. The guard must outlive the process.
fn init_tracing(storage: &StorageConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&storage.log_dir)
        .with_context(|| format!("Failed to create log directory {}", storage.log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&storage.log_dir, &storage.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restock_watcher=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics on port {}", config.port);
    Ok(())
}
