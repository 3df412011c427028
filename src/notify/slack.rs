// src/notify/slack.rs
use async_trait::async_trait;
use reqwest::Client;

use super::{response_body, Channel, OutgoingMessage, TransmitError};
use crate::render::Dialect;

pub struct SlackChannel {
    webhook_url: String,
    dialect: Dialect,
    budget: usize,
    client: Client,
}

impl SlackChannel {
    pub fn new(url: &str, budget: usize, client: Client) -> Self {
        Self {
            webhook_url: url.trim().to_string(),
            dialect: Dialect::slack(),
            budget,
            client,
        }
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn budget(&self) -> usize {
        self.budget
    }

    async fn send(&self, msg: &OutgoingMessage) -> Result<(), TransmitError> {
        let body = serde_json::json!({ "text": msg.body });
        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;
        // Incoming webhooks answer with a bare "ok".
        let text = response_body(resp).await?;
        if text.trim() == "ok" {
            Ok(())
        } else {
            Err(TransmitError::Api(text))
        }
    }
}
