// src/notify/email.rs
//! SMTP channel. Receives the whole report as one plain-text document.

use async_trait::async_trait;
use lettre::address::Address;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{Channel, Delivery, OutgoingMessage, TransmitError, HTTP_TIMEOUT};
use crate::config::Webhooks;
use crate::error::{Result, TrendError};
use crate::render::Dialect;

const SENDER_NAME: &str = "TrendRadar";

/// Well-known providers by sender domain: (domain, host, port).
const SMTP_PRESETS: &[(&str, &str, u16)] = &[
    ("gmail.com", "smtp.gmail.com", 587),
    ("qq.com", "smtp.qq.com", 465),
    ("outlook.com", "smtp-mail.outlook.com", 587),
    ("hotmail.com", "smtp-mail.outlook.com", 587),
    ("live.com", "smtp-mail.outlook.com", 587),
    ("163.com", "smtp.163.com", 465),
    ("126.com", "smtp.126.com", 465),
    ("sina.com", "smtp.sina.com", 465),
    ("sohu.com", "smtp.sohu.com", 465),
    ("189.cn", "smtp.189.cn", 465),
    ("aliyun.com", "smtp.aliyun.com", 465),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpTarget {
    pub host: String,
    pub port: u16,
    /// Port 465 speaks TLS from the first byte; anything else upgrades via STARTTLS.
    pub implicit_tls: bool,
}

/// Explicit server wins; else a preset for the sender's domain; else `smtp.<domain>:587`.
pub fn resolve_smtp(from: &str, server: &str, port: &str) -> Result<SmtpTarget> {
    let explicit_port = match port.trim() {
        "" => None,
        p => Some(
            p.parse::<u16>()
                .map_err(|_| TrendError::config(format!("invalid SMTP port '{p}'")))?,
        ),
    };
    let (host, port) = if !server.trim().is_empty() {
        (server.trim().to_string(), explicit_port.unwrap_or(587))
    } else {
        let domain = from
            .rsplit_once('@')
            .map(|(_, d)| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| TrendError::config(format!("sender '{from}' has no domain")))?;
        match SMTP_PRESETS.iter().find(|(d, _, _)| *d == domain) {
            Some((_, host, port)) => (host.to_string(), explicit_port.unwrap_or(*port)),
            None => {
                tracing::info!(%domain, "unknown mail provider, using generic SMTP settings");
                (format!("smtp.{domain}"), explicit_port.unwrap_or(587))
            }
        }
    };
    Ok(SmtpTarget {
        host,
        port,
        implicit_tls: port == 465,
    })
}

fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse()
        .map_err(|e| TrendError::config(format!("invalid email address '{s}': {e}")))
}

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    target: SmtpTarget,
    dialect: Dialect,
}

impl EmailChannel {
    pub fn from_webhooks(w: &Webhooks) -> Result<Self> {
        let target = resolve_smtp(&w.email_from, &w.email_smtp_server, &w.email_smtp_port)?;
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), parse_address(&w.email_from)?);
        let to = w
            .email_to
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_address(s).map(|a| Mailbox::new(None, a)))
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(TrendError::config("email_to has no recipients"));
        }

        let builder = if target.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&target.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&target.host)
        }
        .map_err(|e| TrendError::config(format!("invalid SMTP host {}: {e}", target.host)))?;
        let mailer = builder
            .port(target.port)
            .timeout(Some(HTTP_TIMEOUT))
            .credentials(Credentials::new(
                w.email_from.trim().to_string(),
                w.email_password.clone(),
            ))
            .build();

        Ok(Self {
            mailer,
            from,
            to,
            target,
            dialect: Dialect::plain(),
        })
    }

    pub fn target(&self) -> &SmtpTarget {
        &self.target
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn budget(&self) -> usize {
        usize::MAX
    }

    fn delivery(&self) -> Delivery {
        Delivery::Document
    }

    async fn send(&self, msg: &OutgoingMessage) -> std::result::Result<(), TransmitError> {
        let subject = format!(
            "Trend report - {} - {}",
            msg.report_type,
            msg.sent_at.format("%Y-%m-%d %H:%M")
        );
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let email = builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(msg.body.clone())
            .map_err(|e| TransmitError::Build(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| TransmitError::Api(format!("smtp: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_and_fallbacks() {
        let qq = resolve_smtp("me@qq.com", "", "").unwrap();
        assert_eq!((qq.host.as_str(), qq.port, qq.implicit_tls), ("smtp.qq.com", 465, true));

        let gmail = resolve_smtp("me@Gmail.com", "", "").unwrap();
        assert_eq!((gmail.port, gmail.implicit_tls), (587, false));

        let generic = resolve_smtp("me@example.org", "", "").unwrap();
        assert_eq!(generic.host, "smtp.example.org");
        assert_eq!(generic.port, 587);

        let explicit = resolve_smtp("me@qq.com", "mail.corp", "465").unwrap();
        assert_eq!((explicit.host.as_str(), explicit.implicit_tls), ("mail.corp", true));

        assert!(resolve_smtp("nobody", "", "").is_err());
        assert!(resolve_smtp("me@qq.com", "", "smtp").is_err());
    }

    #[tokio::test]
    async fn builds_with_multiple_recipients() {
        let w = Webhooks {
            email_from: "bot@163.com".into(),
            email_password: "secret".into(),
            email_to: "a@example.com, b@example.com,".into(),
            ..Webhooks::default()
        };
        let ch = EmailChannel::from_webhooks(&w).unwrap();
        assert_eq!(ch.to.len(), 2);
        assert_eq!(ch.target().port, 465);
        assert_eq!(ch.delivery(), Delivery::Document);
    }
}
