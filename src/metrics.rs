// src/metrics.rs
//! Metric names used across the crate, plus the Prometheus recorder the
//! binary installs. There is no HTTP listener: the rendered exposition is
//! written next to the snapshots after each run, for a textfile collector.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

pub const METRICS_FILE: &str = "metrics.prom";

/// Install the process-wide recorder. `None` when another one is already set.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    }
}

/// Render the current values into `dir/metrics.prom`.
pub fn write_snapshot(handle: &PrometheusHandle, dir: &Path) -> crate::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(METRICS_FILE);
    fs::write(&path, handle.render())?;
    Ok(path)
}

/// One-time registration so series carry descriptions once a recorder exists.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "crawl_source_failures_total",
            "Sources that failed after all fetch retries."
        );
        describe_counter!("crawl_titles_total", "Titles collected from sources.");
        describe_counter!(
            "snapshot_parse_errors_total",
            "Malformed snapshot lines skipped while reading."
        );
        describe_counter!("dispatch_batches_sent_total", "Batches accepted by a channel.");
        describe_counter!(
            "dispatch_rate_limited_total",
            "Sends answered with a rate-limit response."
        );
        describe_counter!(
            "dispatch_channel_failures_total",
            "Channels aborted by a failed send."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::counter;

    #[test]
    fn snapshot_contains_recorded_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            counter!("dispatch_batches_sent_total", "channel" => "slack").increment(2);
        });

        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(&handle, &dir.path().join("out")).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(
            text.contains("dispatch_batches_sent_total{channel=\"slack\"} 2"),
            "{text}"
        );
    }
}
