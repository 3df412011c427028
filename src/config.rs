// src/config.rs
//! Runtime configuration: one explicit value loaded at startup and passed down.
//!
//! Lookup order for the file:
//! 1) `$CONFIG_PATH`
//! 2) `config/config.toml`
//!
//! After parsing, non-empty environment variables override selected keys
//! (report mode, push window, channel credentials) so secrets can stay out of the file.

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrendError};
use crate::gate::PushWindow;
use crate::report::ReportMode;
use crate::scoring::Weights;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";

pub const DEFAULT_VERSION_URL: &str =
    "https://raw.githubusercontent.com/sansan0/TrendRadar/refs/heads/master/version";
pub const DEFAULT_FEED_URL: &str = "https://newsnow.busiyi.world/api/s";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub crawler: CrawlerSection,
    #[serde(default)]
    pub report: ReportSection,
    #[serde(default)]
    pub weight: Weights,
    #[serde(default)]
    pub notification: NotificationSection,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub version_check_url: String,
    pub show_version_update: bool,
    /// Offset from UTC used for day boundaries and displayed times.
    pub timezone_offset_hours: i32,
    pub output_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version_check_url: DEFAULT_VERSION_URL.to_string(),
            show_version_update: true,
            timezone_offset_hours: 8,
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerSection {
    pub enabled: bool,
    pub feed_url: String,
    pub request_interval_ms: u64,
    pub max_retries: u32,
    pub retry_min_wait_secs: u64,
    pub retry_max_wait_secs: u64,
    pub use_proxy: bool,
    pub default_proxy: String,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_url: DEFAULT_FEED_URL.to_string(),
            request_interval_ms: 1000,
            max_retries: 2,
            retry_min_wait_secs: 3,
            retry_max_wait_secs: 5,
            use_proxy: false,
            default_proxy: String::new(),
        }
    }
}

impl CrawlerSection {
    pub fn proxy(&self) -> Option<&str> {
        (self.use_proxy && !self.default_proxy.trim().is_empty())
            .then_some(self.default_proxy.trim())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub mode: ReportMode,
    pub rank_threshold: u32,
    pub sort_by_position_first: bool,
    /// Global per-group display cap; 0 means unbounded.
    pub max_news_per_keyword: usize,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            mode: ReportMode::Daily,
            rank_threshold: 5,
            sort_by_position_first: false,
            max_news_per_keyword: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub enabled: bool,
    pub batch_send_interval_secs: f64,
    pub rate_limit_retry_secs: u64,
    pub feishu_separator: String,
    pub batch_size: BatchSizes,
    pub push_window: PushWindowSection,
    pub webhooks: Webhooks,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_send_interval_secs: 3.0,
            rate_limit_retry_secs: 10,
            feishu_separator: "━━━━━━━━━━━━━━━━━━━".to_string(),
            batch_size: BatchSizes::default(),
            push_window: PushWindowSection::default(),
            webhooks: Webhooks::default(),
        }
    }
}

/// Per-channel byte budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSizes {
    pub default: usize,
    pub dingtalk: usize,
    pub feishu: usize,
    pub bark: usize,
    pub slack: usize,
    pub ntfy: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            default: 4000,
            dingtalk: 20000,
            feishu: 29000,
            bark: 3600,
            slack: 4000,
            ntfy: 3800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushWindowSection {
    pub enabled: bool,
    pub start: String,
    pub end: String,
    pub once_per_day: bool,
    pub record_retention_days: u32,
}

impl Default for PushWindowSection {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "20:00".to_string(),
            end: "22:00".to_string(),
            once_per_day: false,
            record_retention_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Webhooks {
    pub feishu_url: String,
    pub dingtalk_url: String,
    pub wework_url: String,
    pub wework_msg_type: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub email_from: String,
    pub email_password: String,
    pub email_to: String,
    pub email_smtp_server: String,
    pub email_smtp_port: String,
    pub ntfy_server_url: String,
    pub ntfy_topic: String,
    pub ntfy_token: String,
    pub bark_url: String,
    pub slack_webhook_url: String,
}

impl Default for Webhooks {
    fn default() -> Self {
        Self {
            feishu_url: String::new(),
            dingtalk_url: String::new(),
            wework_url: String::new(),
            wework_msg_type: "markdown".to_string(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            email_from: String::new(),
            email_password: String::new(),
            email_to: String::new(),
            email_smtp_server: String::new(),
            email_smtp_port: String::new(),
            ntfy_server_url: "https://ntfy.sh".to_string(),
            ntfy_topic: String::new(),
            ntfy_token: String::new(),
            bark_url: String::new(),
            slack_webhook_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Platform {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl AppConfig {
    /// Parse + validate, without touching the environment.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig =
            toml::from_str(s).map_err(|e| TrendError::config(format!("invalid TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TrendError::config(format!("reading config from {}: {e}", path.display()))
        })?;
        let mut cfg: AppConfig = toml::from_str(&raw)
            .map_err(|e| TrendError::config(format!("invalid TOML in {}: {e}", path.display())))?;
        cfg.apply_overrides(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// `$CONFIG_PATH` if set, else `config/config.toml`. A missing file is fatal.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            return Err(TrendError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Self::from_path(&path)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |k: &str| get(k).map(|v| v.eq_ignore_ascii_case("true") || v == "1");

        if let Some(v) = get("REPORT_MODE") {
            match v.parse::<ReportMode>() {
                Ok(mode) => self.report.mode = mode,
                Err(_) => tracing::warn!(value = %v, "ignoring unknown REPORT_MODE"),
            }
        }
        if let Some(v) = flag("SORT_BY_POSITION_FIRST") {
            self.report.sort_by_position_first = v;
        }
        if let Some(v) = get("MAX_NEWS_PER_KEYWORD").and_then(|v| v.parse().ok()) {
            self.report.max_news_per_keyword = v;
        }
        if let Some(v) = flag("ENABLE_CRAWLER") {
            self.crawler.enabled = v;
        }
        if let Some(v) = flag("ENABLE_NOTIFICATION") {
            self.notification.enabled = v;
        }

        let pw = &mut self.notification.push_window;
        if let Some(v) = flag("PUSH_WINDOW_ENABLED") {
            pw.enabled = v;
        }
        if let Some(v) = get("PUSH_WINDOW_START") {
            pw.start = v;
        }
        if let Some(v) = get("PUSH_WINDOW_END") {
            pw.end = v;
        }
        if let Some(v) = flag("PUSH_WINDOW_ONCE_PER_DAY") {
            pw.once_per_day = v;
        }
        if let Some(v) = get("PUSH_WINDOW_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
            pw.record_retention_days = v;
        }

        let w = &mut self.notification.webhooks;
        let slots: [(&str, &mut String); 16] = [
            ("FEISHU_WEBHOOK_URL", &mut w.feishu_url),
            ("DINGTALK_WEBHOOK_URL", &mut w.dingtalk_url),
            ("WEWORK_WEBHOOK_URL", &mut w.wework_url),
            ("WEWORK_MSG_TYPE", &mut w.wework_msg_type),
            ("TELEGRAM_BOT_TOKEN", &mut w.telegram_bot_token),
            ("TELEGRAM_CHAT_ID", &mut w.telegram_chat_id),
            ("EMAIL_FROM", &mut w.email_from),
            ("EMAIL_PASSWORD", &mut w.email_password),
            ("EMAIL_TO", &mut w.email_to),
            ("EMAIL_SMTP_SERVER", &mut w.email_smtp_server),
            ("EMAIL_SMTP_PORT", &mut w.email_smtp_port),
            ("NTFY_SERVER_URL", &mut w.ntfy_server_url),
            ("NTFY_TOPIC", &mut w.ntfy_topic),
            ("NTFY_TOKEN", &mut w.ntfy_token),
            ("BARK_URL", &mut w.bark_url),
            ("SLACK_WEBHOOK_URL", &mut w.slack_webhook_url),
        ];
        for (key, slot) in slots {
            if let Some(v) = get(key) {
                *slot = v;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(TrendError::config("no platforms configured"));
        }
        if let Some(p) = self.platforms.iter().find(|p| p.id.trim().is_empty()) {
            return Err(TrendError::config(format!(
                "platform with empty id (name {:?})",
                p.name
            )));
        }
        let sizes = &self.notification.batch_size;
        for (name, v) in [
            ("default", sizes.default),
            ("dingtalk", sizes.dingtalk),
            ("feishu", sizes.feishu),
            ("bark", sizes.bark),
            ("slack", sizes.slack),
            ("ntfy", sizes.ntfy),
        ] {
            if v == 0 {
                return Err(TrendError::config(format!("batch_size.{name} must be positive")));
            }
        }
        if !(-12..=14).contains(&self.app.timezone_offset_hours) {
            return Err(TrendError::config("app.timezone_offset_hours out of range"));
        }
        if self.notification.batch_send_interval_secs < 0.0 {
            return Err(TrendError::config("batch_send_interval_secs must not be negative"));
        }
        // Parse the window even when disabled so typos surface early.
        PushWindow::from_section(&self.notification.push_window)?;
        Ok(())
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.app.timezone_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn platform_ids(&self) -> Vec<String> {
        self.platforms.iter().map(|p| p.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
[[platforms]]
id = "zhihu"
name = "Zhihu"

[[platforms]]
id = "weibo"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.report.mode, ReportMode::Daily);
        assert_eq!(cfg.report.rank_threshold, 5);
        assert_eq!(cfg.notification.batch_size.feishu, 29000);
        assert_eq!(cfg.notification.batch_size.ntfy, 3800);
        assert_eq!(cfg.platforms[1].display_name(), "weibo");
        assert_eq!(cfg.timezone().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn no_platforms_is_configuration_error() {
        let err = AppConfig::from_toml_str("[report]\nmode = \"daily\"\n").unwrap_err();
        assert!(matches!(err, TrendError::Configuration(_)));
    }

    #[test]
    fn bad_window_time_rejected() {
        let s = format!(
            "{MINIMAL}\n[notification.push_window]\nenabled = true\nstart = \"25:00\"\n"
        );
        assert!(AppConfig::from_toml_str(&s).is_err());
    }

    #[test]
    fn overrides_ignore_empty_values() {
        let mut cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("REPORT_MODE", "incremental"),
            ("NTFY_TOPIC", "alerts"),
            ("SLACK_WEBHOOK_URL", "   "),
            ("PUSH_WINDOW_ONCE_PER_DAY", "true"),
            ("MAX_NEWS_PER_KEYWORD", "3"),
        ]);
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.report.mode, ReportMode::Incremental);
        assert_eq!(cfg.notification.webhooks.ntfy_topic, "alerts");
        assert!(cfg.notification.webhooks.slack_webhook_url.is_empty());
        assert!(cfg.notification.push_window.once_per_day);
        assert_eq!(cfg.report.max_news_per_keyword, 3);
    }
}
