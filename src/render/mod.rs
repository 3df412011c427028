// src/render/mod.rs
//! Channel markup dialects.
//!
//! Every channel kind owns one [`Dialect`]: a table of wrappers and separators.
//! Rendering code never branches on the channel; it asks the dialect.

pub mod title;

use std::borrow::Cow;

pub use title::{rank_display, render_title, time_display};

/// Text placed around a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrap {
    pub open: &'static str,
    pub close: &'static str,
}

impl Wrap {
    pub const NONE: Wrap = Wrap::new("", "");

    pub const fn new(open: &'static str, close: &'static str) -> Self {
        Self { open, close }
    }

    pub const fn same(tag: &'static str) -> Self {
        Self::new(tag, tag)
    }

    pub fn apply(&self, inner: &str) -> String {
        format!("{}{}{}", self.open, inner, self.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `[title](url)`
    Markdown,
    /// `<a href="url">title</a>`
    Html,
    /// `<url|title>`
    Slack,
    /// Title only.
    None,
}

/// What precedes the report body in every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    None,
    /// Title count, followed by `gap`.
    Count { gap: &'static str },
    /// Title count, time and report type, closed by a rule.
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Feishu,
    Dingtalk,
    Markdown,
    Telegram,
    Ntfy,
    Slack,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub kind: DialectKind,
    pub bold: Wrap,
    pub link: LinkStyle,
    pub rank_hot: Wrap,
    pub source_tag: Wrap,
    pub time_meta: Wrap,
    pub count_meta: Wrap,
    pub seq_label: Wrap,
    pub hot_count: Wrap,
    pub warm_count: Wrap,
    pub failed_item: Wrap,
    pub footer_line: Wrap,
    pub footer_emph: Wrap,
    pub footer_lead: &'static str,
    pub batch_label: Wrap,
    pub preamble: Preamble,
    /// Between keyword groups.
    pub separator: String,
    /// Before the new-titles and failed-sources sections.
    pub section_break: String,
    pub escape_html: bool,
}

impl Dialect {
    fn markdown_base(kind: DialectKind) -> Self {
        let bold = Wrap::same("**");
        Self {
            kind,
            bold,
            link: LinkStyle::Markdown,
            rank_hot: bold,
            source_tag: Wrap::NONE,
            time_meta: Wrap::NONE,
            count_meta: Wrap::NONE,
            seq_label: Wrap::NONE,
            hot_count: bold,
            warm_count: bold,
            failed_item: Wrap::NONE,
            footer_line: Wrap::new("> ", ""),
            footer_emph: bold,
            footer_lead: "\n\n",
            batch_label: bold,
            preamble: Preamble::Count { gap: "\n\n" },
            separator: "\n\n".to_string(),
            section_break: "\n\n".to_string(),
            escape_html: false,
        }
    }

    /// WeWork markdown and Bark.
    pub fn markdown() -> Self {
        Self {
            footer_lead: "\n\n\n",
            preamble: Preamble::Count { gap: "\n\n\n\n" },
            separator: "\n\n\n\n".to_string(),
            section_break: "\n\n\n\n".to_string(),
            ..Self::markdown_base(DialectKind::Markdown)
        }
    }

    pub fn ntfy() -> Self {
        Self {
            time_meta: Wrap::same("`"),
            count_meta: Wrap::same("`"),
            ..Self::markdown_base(DialectKind::Ntfy)
        }
    }

    pub fn dingtalk() -> Self {
        Self {
            failed_item: Wrap::same("**"),
            preamble: Preamble::Detailed,
            separator: "\n---\n\n".to_string(),
            section_break: "\n---\n\n".to_string(),
            ..Self::markdown_base(DialectKind::Dingtalk)
        }
    }

    pub fn feishu(separator_rule: &str) -> Self {
        let grey = Wrap::new("<font color='grey'>", "</font>");
        let framed = format!("\n{separator_rule}\n\n");
        Self {
            rank_hot: Wrap::new("<font color='red'>**", "**</font>"),
            source_tag: grey,
            time_meta: grey,
            count_meta: Wrap::new("<font color='green'>", "</font>"),
            seq_label: grey,
            hot_count: Wrap::new("<font color='red'>", "</font>"),
            warm_count: Wrap::new("<font color='orange'>", "</font>"),
            failed_item: Wrap::new("<font color='red'>", "</font>"),
            footer_line: grey,
            footer_emph: Wrap::NONE,
            preamble: Preamble::None,
            separator: framed.clone(),
            section_break: framed,
            ..Self::markdown_base(DialectKind::Feishu)
        }
    }

    pub fn telegram() -> Self {
        let code = Wrap::new("<code>", "</code>");
        Self {
            kind: DialectKind::Telegram,
            bold: Wrap::NONE,
            link: LinkStyle::Html,
            rank_hot: Wrap::new("<b>", "</b>"),
            source_tag: Wrap::NONE,
            time_meta: code,
            count_meta: code,
            seq_label: Wrap::NONE,
            hot_count: Wrap::NONE,
            warm_count: Wrap::NONE,
            failed_item: Wrap::NONE,
            footer_line: Wrap::NONE,
            footer_emph: Wrap::NONE,
            footer_lead: "\n\n",
            batch_label: Wrap::new("<b>", "</b>"),
            preamble: Preamble::Count { gap: "\n\n" },
            separator: "\n\n".to_string(),
            section_break: "\n\n".to_string(),
            escape_html: true,
        }
    }

    pub fn slack() -> Self {
        let star = Wrap::same("*");
        Self {
            kind: DialectKind::Slack,
            bold: star,
            link: LinkStyle::Slack,
            rank_hot: star,
            time_meta: Wrap::same("`"),
            count_meta: Wrap::same("`"),
            hot_count: star,
            warm_count: star,
            footer_line: Wrap::same("_"),
            footer_emph: star,
            batch_label: star,
            ..Self::markdown_base(DialectKind::Slack)
        }
    }

    /// No markup at all: WeWork text messages and email bodies.
    pub fn plain() -> Self {
        Self {
            kind: DialectKind::Plain,
            bold: Wrap::NONE,
            link: LinkStyle::None,
            rank_hot: Wrap::NONE,
            source_tag: Wrap::NONE,
            time_meta: Wrap::NONE,
            count_meta: Wrap::NONE,
            seq_label: Wrap::NONE,
            hot_count: Wrap::NONE,
            warm_count: Wrap::NONE,
            failed_item: Wrap::NONE,
            footer_line: Wrap::NONE,
            footer_emph: Wrap::NONE,
            footer_lead: "\n\n",
            batch_label: Wrap::NONE,
            preamble: Preamble::Count { gap: "\n\n" },
            separator: "\n\n".to_string(),
            section_break: "\n\n".to_string(),
            escape_html: false,
        }
    }

    /// User-provided text (titles, keywords, source names) in this dialect.
    pub fn text<'a>(&self, s: &'a str) -> Cow<'a, str> {
        if self.escape_html {
            html_escape::encode_text(s)
        } else {
            Cow::Borrowed(s)
        }
    }

    pub fn strong(&self, s: &str) -> String {
        self.bold.apply(s)
    }

    /// Index label prepended to each batch when a message is split.
    pub fn batch_header(&self, index: usize, total: usize) -> String {
        format!("{}\n\n", self.batch_label.apply(&format!("[Batch {index}/{total}]")))
    }

    /// Bytes reserved in every batch for the worst-case index label.
    pub fn header_reservation(&self) -> usize {
        self.header_reservation_for(99)
    }

    /// Reservation for the widest label of a message split into at most `max_total` batches.
    pub fn header_reservation_for(&self, max_total: usize) -> usize {
        self.batch_header(max_total, max_total).len()
    }

    pub fn stats_header(&self) -> String {
        format!("📊 {}\n\n", self.strong("Hot keywords"))
    }

    pub fn group_header(&self, word: &str, count: usize, index: usize, total: usize) -> String {
        let (icon, count_wrap) = if count >= 10 {
            ("🔥", self.hot_count)
        } else if count >= 5 {
            ("📈", self.warm_count)
        } else {
            ("📌", Wrap::NONE)
        };
        format!(
            "{icon} {} {} : {} items\n\n",
            self.seq_label.apply(&format!("[{index}/{total}]")),
            self.strong(&self.text(word)),
            count_wrap.apply(&count.to_string()),
        )
    }

    pub fn new_section_header(&self, total_new: usize) -> String {
        format!(
            "{}🆕 {} ({total_new} items)\n\n",
            self.section_break,
            self.strong("New this crawl")
        )
    }

    pub fn source_header(&self, name: &str, count: usize) -> String {
        format!("{} ({count} items):\n\n", self.strong(&self.text(name)))
    }

    pub fn failed_header(&self) -> String {
        format!("{}⚠️ {}\n\n", self.section_break, self.strong("Failed sources:"))
    }

    pub fn failed_line(&self, source_id: &str) -> String {
        format!("  • {}\n", self.failed_item.apply(&self.text(source_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_header_per_dialect() {
        assert_eq!(Dialect::markdown().batch_header(2, 5), "**[Batch 2/5]**\n\n");
        assert_eq!(Dialect::telegram().batch_header(1, 3), "<b>[Batch 1/3]</b>\n\n");
        assert_eq!(Dialect::slack().batch_header(1, 3), "*[Batch 1/3]*\n\n");
        assert_eq!(Dialect::plain().batch_header(1, 3), "[Batch 1/3]\n\n");
    }

    #[test]
    fn reservation_measures_worst_case_label() {
        assert_eq!(Dialect::plain().header_reservation(), "[Batch 99/99]\n\n".len());
        assert!(Dialect::telegram().header_reservation() > Dialect::plain().header_reservation());
        assert_eq!(
            Dialect::plain().header_reservation_for(150),
            "[Batch 150/150]\n\n".len()
        );
    }

    #[test]
    fn group_header_emphasis_scales_with_count() {
        let f = Dialect::feishu("---");
        assert!(f.group_header("ai", 12, 1, 3).starts_with("🔥 <font color='grey'>[1/3]</font> **ai** : <font color='red'>12</font>"));
        assert!(f.group_header("ai", 6, 1, 3).contains("<font color='orange'>6</font>"));
        assert_eq!(Dialect::plain().group_header("ai", 2, 2, 3), "📌 [2/3] ai : 2 items\n\n");
    }

    #[test]
    fn telegram_escapes_user_text() {
        let t = Dialect::telegram();
        assert_eq!(t.source_header("A&B", 2), "A&amp;B (2 items):\n\n");
    }
}
