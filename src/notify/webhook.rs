// src/notify/webhook.rs
//! JSON webhook robots: Feishu, DingTalk, WeWork.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{response_body, Channel, OutgoingMessage, TransmitError};
use crate::render::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Feishu,
    Dingtalk,
    WeworkMarkdown,
    WeworkText,
}

impl WebhookKind {
    fn name(self) -> &'static str {
        match self {
            Self::Feishu => "feishu",
            Self::Dingtalk => "dingtalk",
            Self::WeworkMarkdown | Self::WeworkText => "wework",
        }
    }

    fn payload(self, msg: &OutgoingMessage) -> Value {
        match self {
            Self::Feishu => json!({
                "msg_type": "text",
                "content": {
                    "total_titles": msg.total_titles,
                    "timestamp": msg.sent_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "report_type": msg.report_type,
                    "text": msg.body,
                }
            }),
            Self::Dingtalk => json!({
                "msgtype": "markdown",
                "markdown": {
                    "title": format!("Trend report - {}", msg.report_type),
                    "text": msg.body,
                }
            }),
            Self::WeworkMarkdown => json!({
                "msgtype": "markdown",
                "markdown": { "content": msg.body }
            }),
            Self::WeworkText => json!({
                "msgtype": "text",
                "text": { "content": msg.body }
            }),
        }
    }

    /// Robots answer 200 with an error code in the body.
    fn check_ack(self, body: &Value) -> Result<(), TransmitError> {
        let ok = match self {
            Self::Feishu => {
                body.get("code").and_then(Value::as_i64) == Some(0)
                    || body.get("StatusCode").and_then(Value::as_i64) == Some(0)
            }
            _ => body.get("errcode").and_then(Value::as_i64) == Some(0),
        };
        if ok {
            return Ok(());
        }
        let msg = ["msg", "errmsg", "StatusMessage"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .unwrap_or("unknown error");
        Err(TransmitError::Api(msg.to_string()))
    }
}

pub struct WebhookChannel {
    kind: WebhookKind,
    url: String,
    dialect: Dialect,
    budget: usize,
    client: Client,
}

impl WebhookChannel {
    pub fn new(kind: WebhookKind, url: &str, dialect: Dialect, budget: usize, client: Client) -> Self {
        Self {
            kind,
            url: url.trim().to_string(),
            dialect,
            budget,
            client,
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn budget(&self) -> usize {
        self.budget
    }

    async fn send(&self, msg: &OutgoingMessage) -> Result<(), TransmitError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&self.kind.payload(msg))
            .send()
            .await?;
        let body = response_body(resp).await?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TransmitError::Api(format!("unreadable response: {e}")))?;
        self.kind.check_ack(&parsed)
    }
}
