// src/batch.rs
//! Byte-bounded splitting of a rendered report.
//!
//! Each channel has a hard byte budget `B`. Every batch is packed to at most
//! `B - R` bytes, where `R` is the size of the widest `[Batch n/n]` label,
//! so labels can be prepended afterwards without overflowing.
//!
//! A group header always travels with its first title (same for a new-titles
//! source header). When a batch overflows, the next one restarts with the
//! preamble plus the headers needed to give its first line context.

use chrono::{DateTime, FixedOffset};

use crate::render::{render_title, Dialect, Preamble};
use crate::report::{ReportData, ReportMode};
use crate::scoring::ScoredTitle;
use crate::update::UpdateInfo;

/// Inputs shared by every channel for one run.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub now: DateTime<FixedOffset>,
    pub rank_threshold: u32,
    pub update: Option<UpdateInfo>,
}

impl RenderContext {
    fn stamp(&self) -> String {
        self.now.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Longest prefix of `s` within `max` bytes, cut on a char boundary.
pub fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

struct Packer {
    capacity: usize,
    base: String,
    footer: String,
    current: String,
    has_content: bool,
    batches: Vec<String>,
}

impl Packer {
    fn new(capacity: usize, base: String, footer: String) -> Self {
        Self {
            capacity,
            current: base.clone(),
            base,
            footer,
            has_content: false,
            batches: Vec::new(),
        }
    }

    fn fits(&self, unit: &str) -> bool {
        self.current.len() + unit.len() + self.footer.len() <= self.capacity
    }

    /// Append `unit`, or flush and start over with `base + restart + unit`.
    fn push(&mut self, unit: &str, restart: &str) {
        if !self.fits(unit) {
            self.flush();
            self.current.push_str(restart);
        }
        self.current.push_str(unit);
        self.has_content = true;
    }

    /// Best effort: dropped when it would force a flush.
    fn push_if_fits(&mut self, filler: &str) {
        if self.fits(filler) {
            self.current.push_str(filler);
        }
    }

    fn flush(&mut self) {
        if self.has_content {
            let body_max = self.capacity.saturating_sub(self.footer.len());
            if self.current.len() > body_max {
                tracing::warn!(
                    bytes = self.current.len() + self.footer.len(),
                    capacity = self.capacity,
                    "oversized batch truncated"
                );
            }
            let mut batch = truncate_to_bytes(&self.current, body_max).to_string();
            batch.push_str(&self.footer);
            let batch = truncate_to_bytes(&batch, self.capacity).to_string();
            self.batches.push(batch);
        }
        self.current = self.base.clone();
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.batches
    }
}

fn preamble(dialect: &Dialect, report: &ReportData, ctx: &RenderContext) -> String {
    let total = report.total_titles();
    match dialect.preamble {
        Preamble::None => String::new(),
        Preamble::Count { gap } => {
            format!("{} {total}{gap}", dialect.strong("Total titles:"))
        }
        Preamble::Detailed => format!(
            "{} {total}\n\n{} {}\n\n{} {}\n\n---\n\n",
            dialect.strong("Total titles:"),
            dialect.strong("Time:"),
            ctx.stamp(),
            dialect.strong("Type:"),
            report.mode.label(),
        ),
    }
}

fn footer(dialect: &Dialect, ctx: &RenderContext) -> String {
    let mut out = dialect.footer_lead.to_string();
    out.push_str(&dialect.footer_line.apply(&format!("Update time: {}", ctx.stamp())));
    if let Some(u) = &ctx.update {
        out.push('\n');
        out.push_str(&dialect.footer_line.apply(&format!(
            "New version available {}, current {}",
            dialect.footer_emph.apply(&u.remote),
            dialect.footer_emph.apply(&u.current),
        )));
    }
    out
}

fn placeholder(mode: ReportMode) -> &'static str {
    match mode {
        ReportMode::Incremental => "📭 No new matching titles in this update\n\n",
        ReportMode::Current => "📭 No matching titles in the current ranking\n\n",
        ReportMode::Daily => "📭 No matching titles today\n\n",
    }
}

fn item_line(n: usize, body: &str, more_follow: bool) -> String {
    let mut line = format!("  {n}. {body}\n");
    if more_follow {
        line.push('\n');
    }
    line
}

/// A section header opens the first unit of its section and is the restart
/// prefix of every later one: `(lead, restart)`.
fn section_lead(first: bool, header: &str) -> (&str, &str) {
    if first {
        (header, "")
    } else {
        ("", header)
    }
}

/// Split `report` into batches of at most `budget - reservation` bytes, where
/// the reservation covers the widest `[Batch n/n]` label for the batch count.
/// Always returns at least one batch.
pub fn split_report(
    report: &ReportData,
    dialect: &Dialect,
    budget: usize,
    ctx: &RenderContext,
) -> Vec<String> {
    let mut max_total = 99;
    loop {
        let capacity = budget.saturating_sub(dialect.header_reservation_for(max_total));
        let batches = pack_report(report, dialect, capacity, ctx);
        if batches.len() <= max_total {
            return batches;
        }
        tracing::debug!(batches = batches.len(), max_total, "batch labels outgrew reservation, re-splitting");
        max_total = max_total.saturating_mul(10).saturating_add(9);
    }
}

fn pack_report(report: &ReportData, dialect: &Dialect, capacity: usize, ctx: &RenderContext) -> Vec<String> {
    let base = preamble(dialect, report, ctx);
    let mut packer = Packer::new(capacity, base, footer(dialect, ctx));

    if report.stats.is_empty() && report.new_titles.is_empty() && report.failed_ids.is_empty() {
        packer.push(placeholder(report.mode), "");
        return packer.finish();
    }

    let threshold = ctx.rank_threshold;

    if !report.stats.is_empty() {
        let stats_header = dialect.stats_header();

        let total_groups = report.stats.len();
        for (i, stat) in report.stats.iter().enumerate() {
            let group_header = dialect.group_header(&stat.word, stat.count, i + 1, total_groups);
            let n = stat.titles.len();
            let mut lines = stat.titles.iter().enumerate().map(|(j, t)| {
                item_line(j + 1, &render_title(dialect, t, true, threshold), j + 1 < n)
            });

            let first = lines.next().unwrap_or_default();
            let (lead, restart) = section_lead(i == 0, &stats_header);
            packer.push(&format!("{lead}{group_header}{first}"), restart);

            let restart = format!("{stats_header}{group_header}");
            for line in lines {
                packer.push(&line, &restart);
            }

            if i + 1 < total_groups {
                packer.push_if_fits(&dialect.separator);
            }
        }
    }

    if !report.new_titles.is_empty() {
        let new_header = dialect.new_section_header(report.total_new_count);

        for (k, section) in report.new_titles.iter().enumerate() {
            let source_header = dialect.source_header(&section.source_name, section.titles.len());
            let mut lines = section.titles.iter().enumerate().map(|(j, t)| {
                let plain = ScoredTitle {
                    is_new: false,
                    ..t.clone()
                };
                item_line(j + 1, &render_title(dialect, &plain, false, threshold), false)
            });

            let first = lines.next().unwrap_or_default();
            let (lead, restart) = section_lead(k == 0, &new_header);
            packer.push(&format!("{lead}{source_header}{first}"), restart);

            let restart = format!("{new_header}{source_header}");
            for line in lines {
                packer.push(&line, &restart);
            }
            packer.push_if_fits("\n");
        }
    }

    if !report.failed_ids.is_empty() {
        let failed_header = dialect.failed_header();
        for (k, id) in report.failed_ids.iter().enumerate() {
            let (lead, restart) = section_lead(k == 0, &failed_header);
            packer.push(&format!("{lead}{}", dialect.failed_line(id)), restart);
        }
    }

    packer.finish()
}

/// Prefix `[Batch i/n]` labels when there is more than one batch, trimming
/// content so each labelled batch stays within `budget`.
pub fn add_batch_headers(batches: Vec<String>, dialect: &Dialect, budget: usize) -> Vec<String> {
    if batches.len() <= 1 {
        return batches;
    }
    let total = batches.len();
    batches
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let header = dialect.batch_header(i + 1, total);
            let room = budget.saturating_sub(header.len());
            format!("{header}{}", truncate_to_bytes(&content, room))
        })
        .collect()
}

/// The whole report as one document, for channels that take no byte budget.
pub fn render_document(report: &ReportData, dialect: &Dialect, ctx: &RenderContext) -> String {
    split_report(report, dialect, usize::MAX, ctx)
        .into_iter()
        .next()
        .unwrap_or_default()
}
