// src/dispatch.rs
//! Sends one report to every registered channel.
//!
//! Channels are independent: a failure aborts only that channel's remaining
//! batches. Batches already delivered are not rolled back.

use metrics::counter;
use std::time::Duration;

use crate::batch::{add_batch_headers, render_document, split_report, RenderContext};
use crate::config::AppConfig;
use crate::error::{Result, TrendError};
use crate::gate::{GateDecision, PushGate};
use crate::notify::{Channel, ChannelRegistry, Delivery, OutgoingMessage, TransmitError};
use crate::report::ReportData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// Pause between two batches on the same channel.
    pub batch_interval: Duration,
    /// Wait before the single retry of a rate-limited send.
    pub rate_limit_delay: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(3),
            rate_limit_delay: Duration::from_secs(10),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            batch_interval: Duration::from_secs_f64(cfg.notification.batch_send_interval_secs.max(0.0)),
            rate_limit_delay: Duration::from_secs(cfg.notification.rate_limit_retry_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutsideWindow,
    AlreadyPushed,
    EmptyReport,
    NoChannels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered { batches: usize },
    Failed { sent: usize, total: usize, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub skipped: Option<SkipReason>,
    pub channels: Vec<ChannelReport>,
    /// Whether today's push record was written by this dispatch.
    pub recorded: bool,
}

impl DispatchSummary {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn any_delivered(&self) -> bool {
        self.channels
            .iter()
            .any(|c| matches!(c.outcome, ChannelOutcome::Delivered { .. }))
    }
}

pub struct Dispatcher<'a> {
    registry: &'a ChannelRegistry,
    gate: PushGate<'a>,
    settings: DispatchSettings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ChannelRegistry, gate: PushGate<'a>, settings: DispatchSettings) -> Self {
        Self {
            registry,
            gate,
            settings,
        }
    }

    pub async fn dispatch(&self, report: &ReportData, ctx: &RenderContext) -> Result<DispatchSummary> {
        if let Err(e) = self.gate.prune(ctx.now) {
            tracing::warn!(error = ?e, "push record cleanup failed");
        }

        match self.gate.should_push(ctx.now)? {
            GateDecision::Open => {}
            GateDecision::OutsideWindow => {
                let w = self.gate.window();
                tracing::info!(
                    now = %ctx.now.format("%H:%M"),
                    start = %w.start.format("%H:%M"),
                    end = %w.end.format("%H:%M"),
                    "outside push window, skipping"
                );
                return Ok(DispatchSummary::skipped(SkipReason::OutsideWindow));
            }
            GateDecision::AlreadyPushed => {
                tracing::info!("already pushed today, skipping");
                return Ok(DispatchSummary::skipped(SkipReason::AlreadyPushed));
            }
        }
        if report.is_empty() {
            tracing::info!(mode = report.mode.as_str(), "nothing to report, skipping");
            return Ok(DispatchSummary::skipped(SkipReason::EmptyReport));
        }
        if self.registry.is_empty() {
            tracing::info!("no channels configured, skipping");
            return Ok(DispatchSummary::skipped(SkipReason::NoChannels));
        }

        let mut summary = DispatchSummary::default();
        for channel in self.registry.iter() {
            let outcome = self.deliver(channel, report, ctx).await;
            if matches!(outcome, ChannelOutcome::Delivered { .. }) && !summary.recorded {
                match self.gate.record_push(ctx.now, report.mode.label()) {
                    Ok(()) => summary.recorded = self.gate.window().once_per_day,
                    Err(e) => tracing::warn!(error = ?e, "failed to write push record"),
                }
            }
            summary.channels.push(ChannelReport {
                channel: channel.name().to_string(),
                outcome,
            });
        }
        Ok(summary)
    }

    async fn deliver(&self, channel: &dyn Channel, report: &ReportData, ctx: &RenderContext) -> ChannelOutcome {
        let dialect = channel.dialect();
        let batches = match channel.delivery() {
            Delivery::Document => vec![render_document(report, dialect, ctx)],
            Delivery::Batched => add_batch_headers(
                split_report(report, dialect, channel.budget(), ctx),
                dialect,
                channel.budget(),
            ),
        };
        let total = batches.len();
        let mut order: Vec<usize> = (0..total).collect();
        if channel.reverse_order() {
            order.reverse();
        }

        for (sent, idx) in order.into_iter().enumerate() {
            let msg = OutgoingMessage {
                body: batches[idx].clone(),
                index: idx + 1,
                total,
                report_type: report.mode.label().to_string(),
                total_titles: report.total_titles(),
                sent_at: ctx.now,
            };
            if let Err(source) = self.send_once_retrying(channel, &msg).await {
                counter!("dispatch_channel_failures_total", "channel" => channel.name().to_string())
                    .increment(1);
                let err = TrendError::ChannelTransmit {
                    channel: channel.name().to_string(),
                    source,
                };
                tracing::warn!(error = %err, cause = ?std::error::Error::source(&err), batch = idx + 1, total, "channel aborted");
                return ChannelOutcome::Failed {
                    sent,
                    total,
                    error: format!("{err}: batch {}/{total}", idx + 1),
                };
            }
            counter!("dispatch_batches_sent_total", "channel" => channel.name().to_string()).increment(1);
            tracing::info!(
                channel = channel.name(),
                batch = idx + 1,
                total,
                bytes = msg.body.len(),
                "batch sent"
            );
            if sent + 1 < total && !self.settings.batch_interval.is_zero() {
                tokio::time::sleep(self.settings.batch_interval).await;
            }
        }
        ChannelOutcome::Delivered { batches: total }
    }

    /// Only rate-limit responses are retried, exactly once after a fixed delay.
    async fn send_once_retrying(
        &self,
        channel: &dyn Channel,
        msg: &OutgoingMessage,
    ) -> std::result::Result<(), TransmitError> {
        match channel.send(msg).await {
            Err(TransmitError::RateLimited) => {
                counter!("dispatch_rate_limited_total", "channel" => channel.name().to_string())
                    .increment(1);
                tracing::warn!(
                    channel = channel.name(),
                    batch = msg.index,
                    delay_ms = self.settings.rate_limit_delay.as_millis() as u64,
                    "rate limited, retrying once"
                );
                tokio::time::sleep(self.settings.rate_limit_delay).await;
                channel.send(msg).await
            }
            other => other,
        }
    }
}
