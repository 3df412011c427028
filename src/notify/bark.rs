// src/notify/bark.rs
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

use super::{response_body, Channel, OutgoingMessage, TransmitError};
use crate::error::{Result, TrendError};
use crate::render::Dialect;

pub struct BarkChannel {
    push_url: String,
    device_key: String,
    dialect: Dialect,
    budget: usize,
    client: Client,
}

impl BarkChannel {
    /// `https://api.day.app/<device_key>` → post to `https://api.day.app/push`.
    pub fn from_url(bark_url: &str, budget: usize, client: Client) -> Result<Self> {
        let url = Url::parse(bark_url.trim())
            .map_err(|e| TrendError::config(format!("invalid bark url: {e}")))?;
        let device_key = url
            .path_segments()
            .and_then(|mut s| s.find(|seg| !seg.is_empty()))
            .ok_or_else(|| TrendError::config("bark url carries no device key"))?
            .to_string();
        let host = url
            .host_str()
            .ok_or_else(|| TrendError::config("bark url has no host"))?;
        let authority = match url.port() {
            Some(p) => format!("{host}:{p}"),
            None => host.to_string(),
        };
        Ok(Self {
            push_url: format!("{}://{}/push", url.scheme(), authority),
            device_key,
            dialect: Dialect::markdown(),
            budget,
            client,
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }
}

#[async_trait]
impl Channel for BarkChannel {
    fn name(&self) -> &str {
        "bark"
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn budget(&self) -> usize {
        self.budget
    }

    fn reverse_order(&self) -> bool {
        true
    }

    async fn send(&self, msg: &OutgoingMessage) -> std::result::Result<(), TransmitError> {
        let payload = json!({
            "title": msg.report_type,
            "markdown": msg.body,
            "device_key": self.device_key,
            "sound": "default",
            "group": "TrendRadar",
            "action": "none",
        });
        let resp = self.client.post(&self.push_url).json(&payload).send().await?;
        let body = response_body(resp).await?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TransmitError::Api(format!("unreadable response: {e}")))?;
        if parsed.get("code").and_then(Value::as_i64) == Some(200) {
            Ok(())
        } else {
            let m = parsed.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            Err(TransmitError::Api(m.to_string()))
        }
    }
}
