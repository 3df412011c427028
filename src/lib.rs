// Public library surface for the binary and integration tests.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frequency;
pub mod gate;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod scoring;
pub mod snapshot;
pub mod store;
pub mod update;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::error::{Result, TrendError};
pub use crate::frequency::FrequencyPolicy;
pub use crate::notify::{Channel, ChannelRegistry};
pub use crate::pipeline::{Pipeline, RunOutcome, RunSummary};
