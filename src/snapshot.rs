// src/snapshot.rs
//! One fetch cycle of ranked titles, and its persisted text form.
//!
//! ```text
//! zhihu | Zhihu
//! 1. Some title [URL:https://...] [MOBILE:https://...]
//! 4. Some title [URL:https://...]
//! 2. Another title
//!
//! weibo
//! 1. ...
//!
//! ==== FAILED SOURCES ====
//! toutiao
//! ```
//!
//! A title seen at several positions in one cycle is written once per rank.

use chrono::NaiveTime;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const FAILED_MARKER: &str = "==== FAILED SOURCES ====";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleObservation {
    pub ranks: Vec<u32>,
    pub url: String,
    pub mobile_url: String,
}

impl TitleObservation {
    pub fn min_rank(&self) -> u32 {
        self.ranks.iter().copied().min().unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSection {
    pub id: String,
    pub name: String,
    pub titles: BTreeMap<String, TitleObservation>,
}

impl SourceSection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            titles: BTreeMap::new(),
        }
    }

    /// Record `title` at `rank`; repeated titles accumulate ranks and keep the
    /// first non-empty links.
    pub fn observe(&mut self, title: &str, rank: u32, url: &str, mobile_url: &str) {
        let title = clean_title(title);
        if title.is_empty() {
            return;
        }
        let obs = self.titles.entry(title).or_default();
        if !obs.ranks.contains(&rank) {
            obs.ranks.push(rank);
        }
        if obs.url.is_empty() {
            obs.url = url.to_string();
        }
        if obs.mobile_url.is_empty() {
            obs.mobile_url = mobile_url.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Wall-clock minute of the fetch cycle; the day is part of the store key.
    pub time: NaiveTime,
    pub sources: Vec<SourceSection>,
    pub failed: Vec<String>,
}

impl Snapshot {
    pub fn new(time: NaiveTime) -> Self {
        Self {
            time,
            sources: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn source(&self, id: &str) -> Option<&SourceSection> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn title_count(&self) -> usize {
        self.sources.iter().map(|s| s.titles.len()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for src in &self.sources {
            if !src.name.is_empty() && src.name != src.id {
                let _ = writeln!(out, "{} | {}", src.id, src.name);
            } else {
                let _ = writeln!(out, "{}", src.id);
            }

            let mut lines: Vec<(u32, &str, &TitleObservation)> = src
                .titles
                .iter()
                .flat_map(|(title, obs)| {
                    let ranks = if obs.ranks.is_empty() { vec![1] } else { obs.ranks.clone() };
                    ranks.into_iter().map(move |r| (r, title.as_str(), obs))
                })
                .collect();
            lines.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

            for (rank, title, obs) in lines {
                let _ = write!(out, "{rank}. {title}");
                if !obs.url.is_empty() {
                    let _ = write!(out, " [URL:{}]", obs.url);
                }
                if !obs.mobile_url.is_empty() {
                    let _ = write!(out, " [MOBILE:{}]", obs.mobile_url);
                }
                out.push('\n');
            }
            out.push('\n');
        }
        if !self.failed.is_empty() {
            out.push_str(FAILED_MARKER);
            out.push('\n');
            for id in &self.failed {
                let _ = writeln!(out, "{id}");
            }
        }
        out
    }

    /// Lenient parse: malformed lines are skipped and counted, never fatal.
    /// Returns the snapshot plus the number of skipped lines.
    pub fn parse(time: NaiveTime, text: &str) -> (Self, usize) {
        let mut snap = Snapshot::new(time);
        let mut skipped = 0usize;

        for block in text.split("\n\n") {
            let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
            let Some(header) = lines.next() else { continue };

            if header == FAILED_MARKER {
                snap.failed.extend(lines.map(str::to_string));
                continue;
            }

            let (id, name) = match header.split_once(" | ") {
                Some((id, name)) => (id.trim(), name.trim()),
                None => (header, header),
            };
            let mut section = SourceSection::new(id, name);

            for line in lines {
                match parse_line(line) {
                    Some((rank, title, url, mobile)) => {
                        section.observe(&title, rank, &url, &mobile)
                    }
                    None => {
                        skipped += 1;
                        counter!("snapshot_parse_errors_total").increment(1);
                        tracing::warn!(source = id, %time, line, "skipping malformed snapshot line");
                    }
                }
            }
            if !section.titles.is_empty() {
                snap.sources.push(section);
            }
        }
        (snap, skipped)
    }
}

fn parse_line(line: &str) -> Option<(u32, String, String, String)> {
    let (rank_str, rest) = line.split_once(". ")?;
    let rank: u32 = rank_str.trim().parse().ok().filter(|r| *r > 0)?;

    let mut title_part = rest;
    let mut mobile = String::new();
    if let Some((head, tail)) = title_part.rsplit_once(" [MOBILE:") {
        if let Some(u) = tail.strip_suffix(']') {
            mobile = u.to_string();
            title_part = head;
        }
    }
    let mut url = String::new();
    if let Some((head, tail)) = title_part.rsplit_once(" [URL:") {
        if let Some(u) = tail.strip_suffix(']') {
            url = u.to_string();
            title_part = head;
        }
    }
    let title = clean_title(title_part);
    if title.is_empty() {
        return None;
    }
    Some((rank, title, url, mobile))
}

/// Collapse whitespace runs (including newlines) into single spaces and trim.
pub fn clean_title(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re.replace_all(s.trim(), " ").into_owned()
}
