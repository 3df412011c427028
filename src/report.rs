// src/report.rs
//! Report assembly: turns the day's history into grouped, scored, capped stats.
//!
//! The mode is chosen once from configuration:
//! - `daily`: whole day, plus a section of titles new in the latest crawl
//! - `current`: only titles present in the latest crawl, with full-day stats
//! - `incremental`: only titles new in the latest crawl (everything on the first
//!   crawl of the day); no separate new-titles section

use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;

use crate::frequency::FrequencyPolicy;
use crate::history::{HistoryEntry, HistoryIndex};
use crate::novelty::NewTitles;
use crate::scoring::{compare_titles, weight, GroupOrder, ScoredTitle, Weights};
use crate::snapshot::{Snapshot, TitleObservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Daily,
    Current,
    Incremental,
}

impl ReportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Current => "current",
            Self::Incremental => "incremental",
        }
    }

    /// Human label used in headers and push records.
    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily Summary",
            Self::Current => "Current Ranking",
            Self::Incremental => "Incremental Update",
        }
    }
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "current" => Ok(Self::Current),
            "incremental" => Ok(Self::Incremental),
            other => Err(format!("unknown report mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendStat {
    pub word: String,
    /// Matches before the display cap.
    pub count: usize,
    /// Declared position of the group.
    pub position: usize,
    pub titles: Vec<ScoredTitle>,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTitleSection {
    pub source_id: String,
    pub source_name: String,
    pub titles: Vec<ScoredTitle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub mode: ReportMode,
    pub stats: Vec<TrendStat>,
    pub new_titles: Vec<NewTitleSection>,
    pub failed_ids: Vec<String>,
    pub total_new_count: usize,
}

impl ReportData {
    pub fn empty(mode: ReportMode) -> Self {
        Self {
            mode,
            stats: Vec::new(),
            new_titles: Vec::new(),
            failed_ids: Vec::new(),
            total_new_count: 0,
        }
    }

    /// Nothing worth sending: no matched groups, and for daily mode no new titles.
    pub fn is_empty(&self) -> bool {
        let no_new = self.mode != ReportMode::Daily || self.new_titles.is_empty();
        self.stats.is_empty() && no_new
    }

    pub fn total_titles(&self) -> usize {
        self.stats.iter().map(|s| s.titles.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub mode: ReportMode,
    pub rank_threshold: u32,
    pub weights: Weights,
    pub group_order: GroupOrder,
    /// Global cap per group, used when the group sets none.
    pub default_cap: Option<usize>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            mode: ReportMode::Daily,
            rank_threshold: 5,
            weights: Weights::default(),
            group_order: GroupOrder::CountFirst,
            default_cap: None,
        }
    }
}

impl ReportSettings {
    pub fn from_config(cfg: &crate::config::AppConfig) -> Self {
        Self {
            mode: cfg.report.mode,
            rank_threshold: cfg.report.rank_threshold,
            weights: cfg.weight,
            group_order: GroupOrder::from_flag(cfg.report.sort_by_position_first),
            default_cap: (cfg.report.max_news_per_keyword > 0)
                .then_some(cfg.report.max_news_per_keyword),
        }
    }
}

/// What the assembler sees of the current day.
#[derive(Debug, Clone, Copy)]
pub struct DayView<'a> {
    pub history: &'a HistoryIndex,
    /// Novelty output: titles of the latest crawl unseen earlier today.
    pub new_titles: &'a NewTitles,
    pub latest: Option<&'a Snapshot>,
    pub first_crawl: bool,
}

pub struct Assembler<'a> {
    settings: ReportSettings,
    policy: &'a FrequencyPolicy,
}

impl<'a> Assembler<'a> {
    pub fn new(settings: ReportSettings, policy: &'a FrequencyPolicy) -> Self {
        Self { settings, policy }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn assemble(&self, view: DayView<'_>, failed_ids: Vec<String>) -> ReportData {
        let mode = self.settings.mode;
        let all_new = mode == ReportMode::Incremental;
        let processed = self.processed_titles(&view);

        let groups = self.policy.groups();
        let mut buckets: Vec<Vec<ScoredTitle>> = vec![Vec::new(); groups.len()];
        for (source_id, title, entry) in &processed {
            let Some(gi) = self.policy.classify(title) else {
                continue;
            };
            let is_new = all_new
                || view
                    .new_titles
                    .get(*source_id)
                    .is_some_and(|m| m.contains_key(*title));
            buckets[gi].push(self.score_entry(view.history, source_id, title, entry, is_new));
        }

        let total = processed.len();
        let mut stats: Vec<TrendStat> = groups
            .iter()
            .zip(buckets)
            .enumerate()
            .filter(|(_, (_, titles))| !titles.is_empty())
            .map(|(position, (group, mut titles))| {
                titles.sort_by(compare_titles);
                let count = titles.len();
                if let Some(cap) = group.max_count.or(self.settings.default_cap) {
                    titles.truncate(cap);
                }
                TrendStat {
                    word: group.group_key.clone(),
                    count,
                    position,
                    titles,
                    percentage: percentage(count, total),
                }
            })
            .collect();
        self.settings
            .group_order
            .sort(&mut stats, |s| (s.position, s.count));

        let new_titles = if mode == ReportMode::Incremental {
            Vec::new()
        } else {
            self.new_title_sections(&view)
        };
        let total_new_count = new_titles.iter().map(|s| s.titles.len()).sum();

        tracing::debug!(
            mode = mode.as_str(),
            processed = total,
            groups = stats.len(),
            new = total_new_count,
            "report assembled"
        );

        ReportData {
            mode,
            stats,
            new_titles,
            failed_ids,
            total_new_count,
        }
    }

    fn processed_titles<'v>(
        &self,
        view: &DayView<'v>,
    ) -> Vec<(&'v String, &'v String, &'v HistoryEntry)> {
        let history = view.history;
        let all = history
            .sources()
            .iter()
            .flat_map(move |sid| history.titles(sid).map(move |(t, e)| (sid, t, e)));

        match self.settings.mode {
            ReportMode::Daily => all.collect(),
            ReportMode::Current => {
                let latest = history.latest_time();
                all.filter(|(_, _, e)| Some(e.last_time) == latest).collect()
            }
            ReportMode::Incremental if view.first_crawl => match view.latest {
                Some(snap) => all
                    .filter(|(sid, t, _)| {
                        snap.source(sid).is_some_and(|s| s.titles.contains_key(*t))
                    })
                    .collect(),
                None => all.collect(),
            },
            ReportMode::Incremental => {
                let fresh: HashSet<(&str, &str)> = view
                    .new_titles
                    .iter()
                    .flat_map(|(sid, m)| m.keys().map(move |t| (sid.as_str(), t.as_str())))
                    .collect();
                all.filter(|(sid, t, _)| fresh.contains(&(sid.as_str(), t.as_str())))
                    .collect()
            }
        }
    }

    fn score_entry(
        &self,
        history: &HistoryIndex,
        source_id: &str,
        title: &str,
        entry: &HistoryEntry,
        is_new: bool,
    ) -> ScoredTitle {
        let ranks: Vec<u32> = entry.ranks.iter().copied().collect();
        let weight = weight(
            &ranks,
            entry.count,
            self.settings.rank_threshold,
            &self.settings.weights,
        );
        ScoredTitle {
            title: title.to_string(),
            source_id: source_id.to_string(),
            source_name: history.source_name(source_id).to_string(),
            span: Some((entry.first_time, entry.last_time)),
            count: entry.count,
            ranks,
            url: entry.url.clone(),
            mobile_url: entry.mobile_url.clone(),
            is_new,
            weight,
        }
    }

    fn new_title_sections(&self, view: &DayView<'_>) -> Vec<NewTitleSection> {
        let mut out = Vec::new();
        for (source_id, titles) in view.new_titles {
            let source_name = view.history.source_name(source_id).to_string();
            let mut items: Vec<ScoredTitle> = titles
                .iter()
                .filter(|(t, _)| self.policy.matches(t))
                .map(|(t, obs)| self.new_item(source_id, &source_name, t, obs))
                .collect();
            if items.is_empty() {
                continue;
            }
            items.sort_by(|a, b| a.min_rank().cmp(&b.min_rank()).then_with(|| a.title.cmp(&b.title)));
            out.push(NewTitleSection {
                source_id: source_id.clone(),
                source_name,
                titles: items,
            });
        }
        // follow the order sources were first seen today
        let order = view.history.sources();
        out.sort_by_key(|s| order.iter().position(|id| *id == s.source_id).unwrap_or(usize::MAX));
        out
    }

    fn new_item(
        &self,
        source_id: &str,
        source_name: &str,
        title: &str,
        obs: &TitleObservation,
    ) -> ScoredTitle {
        let mut ranks = obs.ranks.clone();
        ranks.sort_unstable();
        ranks.dedup();
        ScoredTitle {
            title: title.to_string(),
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            span: None,
            count: 1,
            weight: weight(&ranks, 1, self.settings.rank_threshold, &self.settings.weights),
            ranks,
            url: obs.url.clone(),
            mobile_url: obs.mobile_url.clone(),
            is_new: true,
        }
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::novelty::{all_titles, detect_new_titles};
    use crate::snapshot::SourceSection;
    use chrono::NaiveTime;

    fn snap(h: u32, rows: &[(&str, &str, u32)]) -> Snapshot {
        let mut s = Snapshot::new(NaiveTime::from_hms_opt(h, 0, 0).unwrap());
        for (src, title, rank) in rows {
            if s.source(src).is_none() {
                s.sources.push(SourceSection::new(*src, *src));
            }
            s.sources
                .iter_mut()
                .find(|x| x.id == *src)
                .unwrap()
                .observe(title, *rank, "", "");
        }
        s
    }

    fn run(mode: ReportMode, policy: &str, snaps: &[Snapshot]) -> ReportData {
        let policy = FrequencyPolicy::parse(policy);
        let history = HistoryIndex::build(snaps, None);
        let first_crawl = snaps.len() <= 1;
        let new = if first_crawl && mode == ReportMode::Incremental {
            all_titles(snaps.last().unwrap(), None)
        } else {
            detect_new_titles(snaps, None)
        };
        let settings = ReportSettings {
            mode,
            ..ReportSettings::default()
        };
        Assembler::new(settings, &policy).assemble(
            DayView {
                history: &history,
                new_titles: &new,
                latest: snaps.last(),
                first_crawl,
            },
            Vec::new(),
        )
    }

    #[test]
    fn cap_keeps_count_but_trims_titles() {
        let s = snap(9, &[("a", "cricket final day", 1), ("a", "cricket semi", 7)]);
        let r = run(ReportMode::Daily, "+cricket\n@1\n", &[s]);
        assert_eq!(r.stats.len(), 1);
        assert_eq!(r.stats[0].count, 2);
        assert_eq!(r.stats[0].titles.len(), 1);
        assert_eq!(r.stats[0].titles[0].title, "cricket final day");
        assert_eq!(r.stats[0].percentage, 100.0);
    }

    #[test]
    fn current_mode_keeps_only_latest_but_full_stats() {
        let snaps = vec![
            snap(8, &[("a", "rust one", 3), ("a", "rust gone", 1)]),
            snap(9, &[("a", "rust one", 1)]),
        ];
        let r = run(ReportMode::Current, "rust\n", &snaps);
        let titles = &r.stats[0].titles;
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].count, 2);
        assert_eq!(titles[0].ranks, vec![1, 3]);
    }

    #[test]
    fn incremental_first_crawl_marks_everything_new() {
        let r = run(ReportMode::Incremental, "", &[snap(8, &[("a", "x", 1), ("b", "y", 2)])]);
        assert_eq!(r.stats[0].count, 2);
        assert!(r.stats[0].titles.iter().all(|t| t.is_new));
        assert!(r.new_titles.is_empty());
    }

    #[test]
    fn incremental_later_crawl_only_new() {
        let snaps = vec![snap(8, &[("a", "x", 1)]), snap(9, &[("a", "x", 1), ("a", "y", 2)])];
        let r = run(ReportMode::Incremental, "", &snaps);
        assert_eq!(r.stats[0].titles.len(), 1);
        assert_eq!(r.stats[0].titles[0].title, "y");

        let none = run(ReportMode::Incremental, "", &[snaps[0].clone(), snaps[0].clone()]);
        assert!(none.is_empty());
    }

    #[test]
    fn daily_new_section_goes_through_matcher() {
        let snaps = vec![
            snap(8, &[("a", "rust old", 1)]),
            snap(9, &[("a", "rust old", 1), ("a", "rust new", 2), ("a", "python new", 3)]),
        ];
        let r = run(ReportMode::Daily, "rust\n", &snaps);
        assert_eq!(r.total_new_count, 1);
        assert_eq!(r.new_titles[0].titles[0].title, "rust new");
        assert!(r.new_titles[0].titles[0].span.is_none());
        let marked: Vec<_> = r.stats[0].titles.iter().filter(|t| t.is_new).collect();
        assert_eq!(marked.len(), 1);
    }

    #[test]
    fn daily_with_only_new_titles_is_not_empty() {
        let mut r = ReportData::empty(ReportMode::Daily);
        r.new_titles.push(NewTitleSection {
            source_id: "a".into(),
            source_name: "a".into(),
            titles: Vec::new(),
        });
        assert!(!r.is_empty());
        r.mode = ReportMode::Current;
        assert!(r.is_empty());
    }

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
