// src/pipeline.rs
//! One full run: crawl, persist, reload the day, merge, assemble, dispatch.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveTime, Timelike};
use metrics::gauge;
use reqwest::Client;

use crate::batch::RenderContext;
use crate::config::AppConfig;
use crate::dispatch::{DispatchSettings, DispatchSummary, Dispatcher};
use crate::error::TrendError;
use crate::frequency::FrequencyPolicy;
use crate::gate::{PushGate, PushWindow};
use crate::history::HistoryIndex;
use crate::ingest::types::SourceProvider;
use crate::ingest::{crawl, CrawlSettings};
use crate::metrics::ensure_metrics_described;
use crate::notify::ChannelRegistry;
use crate::novelty::{all_titles, detect_new_titles};
use crate::report::{Assembler, DayView, ReportData, ReportMode, ReportSettings};
use crate::store::{append_snapshot, load_day, DayStore};
use crate::update::check_for_update;

#[derive(Debug)]
pub struct RunSummary {
    pub snapshot_time: NaiveTime,
    /// Snapshots of the day after this run's snapshot was written.
    pub snapshots_today: usize,
    pub failed_sources: Vec<String>,
    pub report: ReportData,
    /// `None` when notifications are disabled.
    pub dispatch: Option<DispatchSummary>,
}

#[derive(Debug)]
pub enum RunOutcome {
    CrawlerDisabled,
    Completed(RunSummary),
}

pub struct Pipeline<'a> {
    cfg: &'a AppConfig,
    policy: &'a FrequencyPolicy,
    store: &'a dyn DayStore,
    provider: &'a dyn SourceProvider,
    registry: &'a ChannelRegistry,
    client: &'a Client,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a AppConfig,
        policy: &'a FrequencyPolicy,
        store: &'a dyn DayStore,
        provider: &'a dyn SourceProvider,
        registry: &'a ChannelRegistry,
        client: &'a Client,
    ) -> Self {
        Self {
            cfg,
            policy,
            store,
            provider,
            registry,
            client,
        }
    }

    pub async fn run_once(&self, now: DateTime<FixedOffset>) -> Result<RunOutcome> {
        ensure_metrics_described();
        let cfg = self.cfg;
        if !cfg.crawler.enabled {
            tracing::info!("crawler disabled, nothing to do");
            return Ok(RunOutcome::CrawlerDisabled);
        }

        let day = now.date_naive();
        let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0)
            .context("building snapshot time")?;
        let platforms = &cfg.platforms;
        let allowlist = cfg.platform_ids();

        let snap = crawl(
            self.provider,
            platforms,
            time,
            &CrawlSettings::from_section(&cfg.crawler),
        )
        .await;
        tracing::info!(
            %day,
            time = %time.format("%H:%M"),
            sources = snap.sources.len(),
            failed = snap.failed.len(),
            titles = snap.title_count(),
            "crawl finished"
        );
        let written = append_snapshot(self.store, day, &snap)
            .with_context(|| format!("writing snapshot {day} {}", time.format("%H:%M")))?;
        if !written {
            tracing::info!(%day, time = %time.format("%H:%M"), "reporting from the snapshot already stored for this minute");
        }

        let snapshots = load_day(self.store, day).with_context(|| format!("loading day {day}"))?;
        let latest = snapshots.last();
        if cfg.report.mode == ReportMode::Current && latest.map(|s| s.time) != Some(time) {
            return Err(TrendError::Consistency(format!(
                "snapshot {day} {} missing after write",
                time.format("%H:%M")
            ))
            .into());
        }

        let first_crawl = snapshots.len() <= 1;
        let history = HistoryIndex::build(&snapshots, Some(allowlist.as_slice()));
        let new_titles = match latest {
            Some(l) if first_crawl && cfg.report.mode == ReportMode::Incremental => {
                all_titles(l, Some(allowlist.as_slice()))
            }
            _ => detect_new_titles(&snapshots, Some(allowlist.as_slice())),
        };
        let report = Assembler::new(ReportSettings::from_config(cfg), self.policy).assemble(
            DayView {
                history: &history,
                new_titles: &new_titles,
                latest,
                first_crawl,
            },
            snap.failed.clone(),
        );

        let dispatch = if cfg.notification.enabled {
            Some(self.dispatch(&report, now).await?)
        } else {
            tracing::info!("notifications disabled, report not sent");
            None
        };

        gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);
        Ok(RunOutcome::Completed(RunSummary {
            snapshot_time: time,
            snapshots_today: snapshots.len(),
            failed_sources: snap.failed,
            report,
            dispatch,
        }))
    }

    async fn dispatch(&self, report: &ReportData, now: DateTime<FixedOffset>) -> Result<DispatchSummary> {
        let cfg = self.cfg;
        let update = if cfg.app.show_version_update && !cfg.app.version_check_url.trim().is_empty() {
            check_for_update(self.client, &cfg.app.version_check_url, env!("CARGO_PKG_VERSION")).await
        } else {
            None
        };
        let ctx = RenderContext {
            now,
            rank_threshold: cfg.report.rank_threshold,
            update,
        };
        let window = PushWindow::from_section(&cfg.notification.push_window)?;
        let gate = PushGate::new(window, self.store);
        let summary = Dispatcher::new(self.registry, gate, DispatchSettings::from_config(cfg))
            .dispatch(report, &ctx)
            .await
            .context("dispatching report")?;
        if let Some(reason) = summary.skipped {
            tracing::info!(?reason, "dispatch skipped");
        } else {
            tracing::info!(
                channels = summary.channels.len(),
                delivered = summary.any_delivered(),
                "dispatch finished"
            );
        }
        Ok(summary)
    }
}
