// src/ingest/providers/newsnow.rs
//! HTTP client for the NewsNow-style aggregator: `GET {base}?id={source}&latest`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, TrendError};
use crate::ingest::types::{FeedItem, FeedResponse, FeedStatus, SourceProvider};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    title: Value,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "mobileUrl")]
    mobile_url: Option<String>,
}

/// Strings are kept, integers are stringified, anything else is dropped.
fn title_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Decode one aggregator body. Only `success` and `cache` statuses are accepted.
pub fn parse_feed(source_id: &str, body: &str) -> Result<FeedResponse> {
    let env: Envelope = serde_json::from_str(body).map_err(|e| TrendError::SourceFetch {
        source_id: source_id.to_string(),
        reason: format!("invalid JSON: {e}"),
    })?;
    let status = match env.status.as_str() {
        "success" => FeedStatus::Fresh,
        "cache" => FeedStatus::Cached,
        other => {
            return Err(TrendError::SourceFetch {
                source_id: source_id.to_string(),
                reason: format!("unexpected status '{other}'"),
            })
        }
    };
    let items = env
        .items
        .into_iter()
        .filter_map(|raw| {
            let title = title_text(&raw.title)?;
            Some(FeedItem {
                title,
                url: raw.url.unwrap_or_default(),
                mobile_url: raw.mobile_url.unwrap_or_default(),
            })
        })
        .collect();
    Ok(FeedResponse { status, items })
}

pub struct NewsNowProvider {
    base_url: String,
    client: Client,
}

impl NewsNowProvider {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn request_url(&self, source_id: &str) -> String {
        format!("{}?id={}&latest", self.base_url, source_id)
    }
}

#[async_trait]
impl SourceProvider for NewsNowProvider {
    async fn fetch(&self, source_id: &str) -> Result<FeedResponse> {
        let fail = |reason: String| TrendError::SourceFetch {
            source_id: source_id.to_string(),
            reason,
        };
        let resp = self
            .client
            .get(self.request_url(source_id))
            .header(USER_AGENT, BROWSER_UA)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status.as_u16())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| fail(format!("reading body: {e}")))?;
        let feed = parse_feed(source_id, &body)?;
        tracing::debug!(
            source = source_id,
            cached = feed.status == FeedStatus::Cached,
            items = feed.items.len(),
            "feed fetched"
        );
        Ok(feed)
    }

    fn name(&self) -> &'static str {
        "newsnow"
    }
}
