// src/frequency.rs
//! Keyword policy: which titles are worth reporting, and under which group.
//!
//! File format: blank-line separated blocks, one token per line.
//! - `word`  normal word (any one must appear)
//! - `+word` required word (all must appear)
//! - `!word` global filter (title rejected if it contains it)
//! - `@N`    display cap for the block, positive integers only
//!
//! Matching is a case-insensitive substring test.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrendError};

pub const DEFAULT_FREQUENCY_PATH: &str = "config/frequency_words.txt";
pub const ENV_FREQUENCY_PATH: &str = "FREQUENCY_WORDS_PATH";

/// Key of the synthetic group used when no blocks are configured.
pub const CATCH_ALL_KEY: &str = "All titles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyGroup {
    pub required: Vec<String>,
    pub normal: Vec<String>,
    pub group_key: String,
    pub max_count: Option<usize>,
}

impl FrequencyGroup {
    fn catch_all() -> Self {
        Self {
            required: Vec::new(),
            normal: Vec::new(),
            group_key: CATCH_ALL_KEY.to_string(),
            max_count: None,
        }
    }

    fn accepts(&self, lower_title: &str) -> bool {
        let required_ok = self
            .required
            .iter()
            .all(|w| lower_title.contains(&w.to_lowercase()));
        let normal_ok = self.normal.is_empty()
            || self
                .normal
                .iter()
                .any(|w| lower_title.contains(&w.to_lowercase()));
        required_ok && normal_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyPolicy {
    groups: Vec<FrequencyGroup>,
    filter_words: Vec<String>,
}

impl FrequencyPolicy {
    pub fn parse(text: &str) -> Self {
        let mut groups = Vec::new();
        let mut filter_words = Vec::new();

        for block in split_blocks(text) {
            let mut required = Vec::new();
            let mut normal = Vec::new();
            let mut max_count = None;

            for line in block {
                if let Some(cap) = line.strip_prefix('@') {
                    match cap.trim().parse::<usize>() {
                        Ok(n) if n > 0 => max_count = Some(n),
                        _ => tracing::debug!(line, "ignoring invalid cap"),
                    }
                } else if let Some(w) = line.strip_prefix('!') {
                    push_word(&mut filter_words, w);
                } else if let Some(w) = line.strip_prefix('+') {
                    push_word(&mut required, w);
                } else {
                    push_word(&mut normal, line);
                }
            }

            // Blocks holding only filters/caps do not form a group.
            if required.is_empty() && normal.is_empty() {
                continue;
            }
            let group_key = if normal.is_empty() {
                required.join(" ")
            } else {
                normal.join(" ")
            };
            groups.push(FrequencyGroup {
                required,
                normal,
                group_key,
                max_count,
            });
        }

        Self {
            groups,
            filter_words,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TrendError::config(format!("reading frequency words from {}: {e}", path.display()))
        })?;
        Ok(Self::parse(&raw))
    }

    /// `$FREQUENCY_WORDS_PATH` if set, else `config/frequency_words.txt`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_FREQUENCY_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FREQUENCY_PATH));
        if !path.exists() {
            return Err(TrendError::config(format!(
                "frequency words file {} does not exist",
                path.display()
            )));
        }
        Self::from_path(&path)
    }

    pub fn is_catch_all(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in declared order. With no configured groups this is the single
    /// synthetic catch-all group.
    pub fn groups(&self) -> Vec<FrequencyGroup> {
        if self.groups.is_empty() {
            vec![FrequencyGroup::catch_all()]
        } else {
            self.groups.clone()
        }
    }

    pub fn filter_words(&self) -> &[String] {
        &self.filter_words
    }

    /// Index into [`groups`](Self::groups) of the first accepting group.
    pub fn classify(&self, title: &str) -> Option<usize> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        if self.groups.is_empty() {
            return Some(0);
        }
        let lower = title.to_lowercase();
        if self
            .filter_words
            .iter()
            .any(|w| lower.contains(&w.to_lowercase()))
        {
            return None;
        }
        self.groups.iter().position(|g| g.accepts(&lower))
    }

    pub fn matches(&self, title: &str) -> bool {
        self.classify(title).is_some()
    }
}

fn push_word(into: &mut Vec<String>, raw: &str) {
    let w = raw.trim();
    if !w.is_empty() {
        into.push(w.to_string());
    }
}

fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}
