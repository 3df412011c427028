// src/notify/telegram.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{response_body, Channel, OutgoingMessage, TransmitError};
use crate::render::Dialect;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    api_base: String,
    token: String,
    chat_id: String,
    dialect: Dialect,
    budget: usize,
    client: Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramChannel {
    pub fn new(token: &str, chat_id: &str, budget: usize, client: Client) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
            dialect: Dialect::telegram(),
            budget,
            client,
        }
    }

    /// Point at another Bot API host (self-hosted server, tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn budget(&self) -> usize {
        self.budget
    }

    async fn send(&self, msg: &OutgoingMessage) -> Result<(), TransmitError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &msg.body,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let resp = self.client.post(self.endpoint()).json(&payload).send().await?;
        let body = response_body(resp).await?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TransmitError::Api(format!("unreadable response: {e}")))?;
        if parsed.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            let desc = parsed
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(TransmitError::Api(desc.to_string()))
        }
    }
}
