// src/ingest/mod.rs
//! One crawl cycle: every configured platform is fetched in turn, with retries
//! and jittered pacing, and folded into a single [`Snapshot`].

pub mod providers;
pub mod types;

use chrono::NaiveTime;
use metrics::counter;
use rand::Rng;
use std::time::Duration;

use crate::config::{CrawlerSection, Platform};
use crate::ingest::types::{FeedResponse, SourceProvider};
use crate::metrics::ensure_metrics_described;
use crate::snapshot::{SourceSection, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlSettings {
    pub request_interval: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub retry_min_wait: Duration,
    pub retry_max_wait: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            request_interval: Duration::from_millis(1000),
            max_retries: 2,
            retry_min_wait: Duration::from_secs(3),
            retry_max_wait: Duration::from_secs(5),
        }
    }
}

impl CrawlSettings {
    pub fn from_section(s: &CrawlerSection) -> Self {
        let min = Duration::from_secs(s.retry_min_wait_secs);
        Self {
            request_interval: Duration::from_millis(s.request_interval_ms),
            max_retries: s.max_retries,
            retry_min_wait: min,
            retry_max_wait: Duration::from_secs(s.retry_max_wait_secs).max(min),
        }
    }
}

/// Wait before retry number `retry` (1-based): a uniform base in
/// `[min, max]` plus `(retry - 1)` extra seconds drawn from `[1, 2)` each.
pub fn retry_delay(settings: &CrawlSettings, retry: u32) -> Duration {
    let mut rng = rand::rng();
    let lo = settings.retry_min_wait.as_secs_f64();
    let hi = settings.retry_max_wait.as_secs_f64().max(lo);
    let base = if hi > lo { rng.random_range(lo..=hi) } else { lo };
    let extra = f64::from(retry.saturating_sub(1)) * rng.random_range(1.0..2.0);
    Duration::from_secs_f64(base + extra)
}

/// Pause between two source requests: interval plus jitter in `[-10, 20]` ms,
/// never below 50 ms.
pub fn pacing_delay(settings: &CrawlSettings) -> Duration {
    let jitter: i64 = rand::rng().random_range(-10..=20);
    let ms = (settings.request_interval.as_millis() as i64 + jitter).max(50);
    Duration::from_millis(ms as u64)
}

async fn fetch_with_retry(
    provider: &dyn SourceProvider,
    source_id: &str,
    settings: &CrawlSettings,
) -> crate::error::Result<FeedResponse> {
    let mut retry = 0u32;
    loop {
        match provider.fetch(source_id).await {
            Ok(feed) => return Ok(feed),
            Err(e) if retry < settings.max_retries => {
                retry += 1;
                let wait = retry_delay(settings, retry);
                tracing::warn!(
                    error = %e,
                    source = source_id,
                    retry,
                    wait_ms = wait.as_millis() as u64,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch every platform once. Sources that exhaust their retries are listed in
/// `Snapshot::failed`; the crawl itself never fails.
pub async fn crawl(
    provider: &dyn SourceProvider,
    platforms: &[Platform],
    time: NaiveTime,
    settings: &CrawlSettings,
) -> Snapshot {
    ensure_metrics_described();

    let mut snap = Snapshot::new(time);
    for (i, platform) in platforms.iter().enumerate() {
        match fetch_with_retry(provider, &platform.id, settings).await {
            Ok(feed) => {
                let mut section = SourceSection::new(&platform.id, platform.display_name());
                for (pos, item) in feed.items.iter().enumerate() {
                    section.observe(&item.title, pos as u32 + 1, &item.url, &item.mobile_url);
                }
                counter!("crawl_titles_total", "source" => platform.id.clone())
                    .increment(section.titles.len() as u64);
                tracing::info!(
                    source = %platform.id,
                    titles = section.titles.len(),
                    provider = provider.name(),
                    "source fetched"
                );
                snap.sources.push(section);
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = %platform.id, provider = provider.name(), "source failed");
                counter!("crawl_source_failures_total", "source" => platform.id.clone()).increment(1);
                snap.failed.push(platform.id.clone());
            }
        }
        if i + 1 < platforms.len() && !settings.request_interval.is_zero() {
            tokio::time::sleep(pacing_delay(settings)).await;
        }
    }
    snap
}
