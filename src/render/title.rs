// src/render/title.rs
use chrono::NaiveTime;

use super::{Dialect, LinkStyle};
use crate::scoring::ScoredTitle;

/// `[3]` or `[1 - 8]`, emphasized when the best rank is within `threshold`.
pub fn rank_display(dialect: &Dialect, ranks: &[u32], threshold: u32) -> String {
    let (Some(min), Some(max)) = (ranks.iter().min(), ranks.iter().max()) else {
        return String::new();
    };
    let label = if min == max {
        format!("[{min}]")
    } else {
        format!("[{min} - {max}]")
    };
    if *min <= threshold {
        dialect.rank_hot.apply(&label)
    } else {
        label
    }
}

/// `09:30` for a single sighting, `[09:30 ~ 12:00]` otherwise.
pub fn time_display(first: NaiveTime, last: NaiveTime) -> String {
    let f = first.format("%H:%M");
    if first == last {
        f.to_string()
    } else {
        format!("[{f} ~ {}]", last.format("%H:%M"))
    }
}

fn link(dialect: &Dialect, title: &str, url: &str) -> String {
    if url.is_empty() {
        return dialect.text(title).into_owned();
    }
    match dialect.link {
        LinkStyle::Markdown => format!("[{title}]({url})"),
        LinkStyle::Html => format!("<a href=\"{url}\">{}</a>", dialect.text(title)),
        LinkStyle::Slack => format!("<{url}|{title}>"),
        LinkStyle::None => title.to_string(),
    }
}

/// One title line body (without list numbering).
pub fn render_title(dialect: &Dialect, t: &ScoredTitle, show_source: bool, threshold: u32) -> String {
    let url = if t.mobile_url.is_empty() { &t.url } else { &t.mobile_url };
    let mut out = String::new();

    if show_source {
        let tag = format!("[{}]", dialect.text(&t.source_name));
        out.push_str(&dialect.source_tag.apply(&tag));
        out.push(' ');
    }
    if t.is_new {
        out.push_str("🆕 ");
    }
    out.push_str(&link(dialect, &t.title, url));

    let rank = rank_display(dialect, &t.ranks, threshold);
    if !rank.is_empty() {
        out.push(' ');
        out.push_str(&rank);
    }
    if let Some((first, last)) = t.span {
        out.push(' ');
        out.push_str(&dialect.time_meta.apply(&format!("- {}", time_display(first, last))));
    }
    if t.count > 1 {
        out.push(' ');
        out.push_str(&dialect.count_meta.apply(&format!("({} times)", t.count)));
    }
    out
}
