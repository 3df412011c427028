//! trend-radar binary entrypoint.
//! Loads configuration, runs one crawl-and-dispatch cycle and exits.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_radar::ingest::providers::NewsNowProvider;
use trend_radar::metrics;
use trend_radar::notify::http_client;
use trend_radar::store::FsStore;
use trend_radar::{AppConfig, ChannelRegistry, FrequencyPolicy, Pipeline, RunOutcome};

/// Compact logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trend_radar=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    let prom = metrics::install_recorder();

    let cfg = AppConfig::load().context("loading configuration")?;
    let policy = FrequencyPolicy::load_default().context("loading frequency words")?;
    tracing::info!(
        platforms = cfg.platforms.len(),
        groups = policy.groups().len(),
        mode = cfg.report.mode.as_str(),
        "configuration loaded"
    );

    let client = http_client(cfg.crawler.proxy()).context("building HTTP client")?;
    let registry = ChannelRegistry::from_config(&cfg, &client).context("configuring channels")?;
    let provider = NewsNowProvider::new(&cfg.crawler.feed_url, client.clone());
    let store = FsStore::new(cfg.app.output_dir.clone());

    let now = Utc::now().with_timezone(&cfg.timezone());
    let pipeline = Pipeline::new(&cfg, &policy, &store, &provider, &registry, &client);
    let outcome = pipeline.run_once(now).await;
    if let Some(handle) = &prom {
        match metrics::write_snapshot(handle, &cfg.app.output_dir) {
            Ok(path) => tracing::debug!(path = %path.display(), "metrics written"),
            Err(e) => tracing::warn!(error = ?e, "failed to write metrics"),
        }
    }
    match outcome? {
        RunOutcome::CrawlerDisabled => tracing::info!("crawler disabled, exiting"),
        RunOutcome::Completed(summary) => {
            tracing::info!(
                snapshots = summary.snapshots_today,
                failed = summary.failed_sources.len(),
                titles = summary.report.total_titles(),
                "run complete"
            );
        }
    }
    Ok(())
}
