// src/scoring.rs
//! Composite weight of a title from rank, frequency and hotness.

use chrono::NaiveTime;
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub rank: f64,
    pub frequency: f64,
    pub hotness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            rank: 0.6,
            frequency: 0.3,
            hotness: 0.1,
        }
    }
}

/// `rank*Wr + freq*Wf + hot*Wh` where
/// - rank = mean of `11 - min(r, 10)` over observed ranks
/// - freq = `min(count, 10) * 10`
/// - hot  = share of ranks `<= threshold`, times 100
///
/// No ranks means weight 0.
pub fn weight(ranks: &[u32], count: u32, threshold: u32, w: &Weights) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let n = ranks.len() as f64;
    let rank_component: f64 = ranks
        .iter()
        .map(|r| f64::from(11 - (*r).min(10)))
        .sum::<f64>()
        / n;
    let freq_component = f64::from(count.min(10)) * 10.0;
    let high = ranks.iter().filter(|r| **r <= threshold).count() as f64;
    let hot_component = high / n * 100.0;

    rank_component * w.rank + freq_component * w.frequency + hot_component * w.hotness
}

/// A history entry prepared for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTitle {
    pub title: String,
    pub source_id: String,
    pub source_name: String,
    /// First and last sighting; `None` for entries shown without a time span.
    pub span: Option<(NaiveTime, NaiveTime)>,
    pub count: u32,
    /// Ascending, deduplicated.
    pub ranks: Vec<u32>,
    pub url: String,
    pub mobile_url: String,
    pub is_new: bool,
    pub weight: f64,
}

impl ScoredTitle {
    pub fn min_rank(&self) -> u32 {
        self.ranks.first().copied().unwrap_or(u32::MAX)
    }

    pub fn max_rank(&self) -> u32 {
        self.ranks.last().copied().unwrap_or(u32::MAX)
    }
}

/// Weight desc, then best rank asc, then count desc.
pub fn compare_titles(a: &ScoredTitle, b: &ScoredTitle) -> Ordering {
    b.weight
        .partial_cmp(&a.weight)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.min_rank().cmp(&b.min_rank()))
        .then_with(|| b.count.cmp(&a.count))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupOrder {
    /// Count desc; declared position breaks ties.
    #[default]
    CountFirst,
    /// Declared position, then count desc.
    PositionFirst,
}

impl GroupOrder {
    pub fn from_flag(position_first: bool) -> Self {
        if position_first {
            Self::PositionFirst
        } else {
            Self::CountFirst
        }
    }

    /// Stable sort of items keyed by `(declared position, count)`.
    pub fn sort<T>(self, items: &mut [T], key: impl Fn(&T) -> (usize, usize)) {
        match self {
            Self::PositionFirst => items.sort_by(|a, b| {
                let (pa, ca) = key(a);
                let (pb, cb) = key(b);
                pa.cmp(&pb).then(cb.cmp(&ca))
            }),
            Self::CountFirst => items.sort_by(|a, b| {
                let (pa, ca) = key(a);
                let (pb, cb) = key(b);
                cb.cmp(&ca).then(pa.cmp(&pb))
            }),
        }
    }
}
