// src/notify/ntfy.rs
use async_trait::async_trait;
use reqwest::Client;

use super::{response_body, Channel, OutgoingMessage, TransmitError};
use crate::render::Dialect;

pub struct NtfyChannel {
    url: String,
    token: Option<String>,
    dialect: Dialect,
    budget: usize,
    client: Client,
}

/// `ntfy.sh/` and `https://ntfy.sh` both become `https://ntfy.sh`.
pub fn normalize_server(server: &str) -> String {
    let s = server.trim().trim_end_matches('/');
    if s.starts_with("http://") || s.starts_with("https://") {
        s.to_string()
    } else {
        format!("https://{s}")
    }
}

impl NtfyChannel {
    pub fn new(server: &str, topic: &str, token: Option<&str>, budget: usize, client: Client) -> Self {
        Self {
            url: format!("{}/{}", normalize_server(server), topic.trim()),
            token: token.map(|t| t.trim().to_string()),
            dialect: Dialect::ntfy(),
            budget,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Channel for NtfyChannel {
    fn name(&self) -> &str {
        "ntfy"
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

    async fn send(&self, msg: &OutgoingMessage) -> Result<(), TransmitError> {
        let title = if msg.total > 1 {
            format!("{} ({}/{})", msg.report_type, msg.index, msg.total)
        } else {
            msg.report_type.clone()
        };
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Markdown", "yes")
            .header("Title", title)
            .body(msg.body.clone());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        response_body(req.send().await?).await.map(|_| ())
    }
}
