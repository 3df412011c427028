// src/ingest/types.rs
use crate::error::Result;

/// Whether the aggregator answered from a live fetch or its own cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Fresh,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub mobile_url: String,
}

/// Items in ranked order; rank is position + 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    pub status: FeedStatus,
    pub items: Vec<FeedItem>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<FeedResponse>;
    fn name(&self) -> &'static str;
}
