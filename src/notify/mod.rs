// src/notify/mod.rs
//! Push channels.
//!
//! Every channel is a registered strategy: it exposes its markup dialect, byte
//! budget and ordering, and knows how to put one payload on the wire. Adding a
//! channel means registering another [`Channel`], never editing the dispatcher.

pub mod bark;
pub mod email;
pub mod ntfy;
pub mod slack;
pub mod telegram;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{Result, TrendError};
use crate::render::Dialect;

pub use bark::BarkChannel;
pub use email::EmailChannel;
pub use ntfy::NtfyChannel;
pub use slack::SlackChannel;
pub use telegram::TelegramChannel;
pub use webhook::{WebhookChannel, WebhookKind};

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("rate limited by remote")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rejected by API: {0}")]
    Api(String),
    #[error("transport: {0}")]
    Transport(reqwest::Error),
    #[error("building message: {0}")]
    Build(String),
}

/// Request URLs can carry credentials (the Telegram bot token sits in the path),
/// so they are stripped before the error is logged anywhere.
impl From<reqwest::Error> for TransmitError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url())
    }
}

/// How a channel wants the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Split to the channel budget and sent batch by batch.
    Batched,
    /// One pre-rendered document, no splitting.
    Document,
}

/// One payload about to be transmitted.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub body: String,
    /// 1-based logical position.
    pub index: usize,
    pub total: usize,
    pub report_type: String,
    pub total_titles: usize,
    pub sent_at: DateTime<FixedOffset>,
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    fn dialect(&self) -> &Dialect;
    /// Hard byte ceiling of one payload.
    fn budget(&self) -> usize;
    /// Clients that show the newest message on top get batches last-to-first.
    fn reverse_order(&self) -> bool {
        false
    }
    fn delivery(&self) -> Delivery {
        Delivery::Batched
    }
    async fn send(&self, msg: &OutgoingMessage) -> std::result::Result<(), TransmitError>;
}

/// Map the HTTP status to an error and return the body of a 2xx response.
pub(crate) async fn response_body(resp: Response) -> std::result::Result<String, TransmitError> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TransmitError::RateLimited);
    }
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(TransmitError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    Ok(body)
}

/// Shared HTTP client: fixed timeout, optional proxy.
pub fn http_client(proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().timeout(HTTP_TIMEOUT);
    if let Some(p) = proxy {
        let proxy = reqwest::Proxy::all(p)
            .map_err(|e| TrendError::config(format!("invalid proxy '{p}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| TrendError::config(format!("building HTTP client: {e}")))
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Box<dyn Channel>) {
        tracing::debug!(channel = channel.name(), "channel registered");
        self.channels.push(channel);
    }

    pub fn with(mut self, channel: impl Channel + 'static) -> Self {
        self.register(Box::new(channel));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Channel> {
        self.channels.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Every channel whose credentials are present in `cfg`.
    pub fn from_config(cfg: &AppConfig, client: &Client) -> Result<Self> {
        let n = &cfg.notification;
        let w = &n.webhooks;
        let sizes = &n.batch_size;
        let set = |s: &str| !s.trim().is_empty();
        let mut reg = Self::new();

        if set(&w.feishu_url) {
            reg.register(Box::new(WebhookChannel::new(
                WebhookKind::Feishu,
                &w.feishu_url,
                Dialect::feishu(&n.feishu_separator),
                sizes.feishu,
                client.clone(),
            )));
        }
        if set(&w.dingtalk_url) {
            reg.register(Box::new(WebhookChannel::new(
                WebhookKind::Dingtalk,
                &w.dingtalk_url,
                Dialect::dingtalk(),
                sizes.dingtalk,
                client.clone(),
            )));
        }
        if set(&w.wework_url) {
            let (kind, dialect) = if w.wework_msg_type.eq_ignore_ascii_case("text") {
                (WebhookKind::WeworkText, Dialect::plain())
            } else {
                (WebhookKind::WeworkMarkdown, Dialect::markdown())
            };
            reg.register(Box::new(WebhookChannel::new(
                kind,
                &w.wework_url,
                dialect,
                sizes.default,
                client.clone(),
            )));
        }
        if set(&w.telegram_bot_token) && set(&w.telegram_chat_id) {
            reg.register(Box::new(TelegramChannel::new(
                &w.telegram_bot_token,
                &w.telegram_chat_id,
                sizes.default,
                client.clone(),
            )));
        }
        if set(&w.email_from) && set(&w.email_password) && set(&w.email_to) {
            reg.register(Box::new(EmailChannel::from_webhooks(w)?));
        }
        if set(&w.ntfy_server_url) && set(&w.ntfy_topic) {
            reg.register(Box::new(NtfyChannel::new(
                &w.ntfy_server_url,
                &w.ntfy_topic,
                Some(w.ntfy_token.as_str()).filter(|t| set(t)),
                sizes.ntfy,
                client.clone(),
            )));
        }
        if set(&w.bark_url) {
            reg.register(Box::new(BarkChannel::from_url(&w.bark_url, sizes.bark, client.clone())?));
        }
        if set(&w.slack_webhook_url) {
            reg.register(Box::new(SlackChannel::new(
                &w.slack_webhook_url,
                sizes.slack,
                client.clone(),
            )));
        }

        tracing::info!(channels = reg.len(), "notification channels configured");
        Ok(reg)
    }
}
