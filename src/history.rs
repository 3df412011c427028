// src/history.rs
//! Per-day aggregate of every title seen, folded from the day's snapshots.

use chrono::NaiveTime;
use std::collections::{BTreeMap, BTreeSet};

use crate::snapshot::{Snapshot, TitleObservation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub first_time: NaiveTime,
    pub last_time: NaiveTime,
    pub count: u32,
    pub ranks: BTreeSet<u32>,
    pub url: String,
    pub mobile_url: String,
}

impl HistoryEntry {
    fn first_sighting(time: NaiveTime, obs: &TitleObservation) -> Self {
        Self {
            first_time: time,
            last_time: time,
            count: 1,
            ranks: obs.ranks.iter().copied().collect(),
            url: obs.url.clone(),
            mobile_url: obs.mobile_url.clone(),
        }
    }

    fn merge(&mut self, time: NaiveTime, obs: &TitleObservation) {
        self.ranks.extend(obs.ranks.iter().copied());
        self.count += 1;
        self.last_time = time;
        if self.url.is_empty() {
            self.url = obs.url.clone();
        }
        if self.mobile_url.is_empty() {
            self.mobile_url = obs.mobile_url.clone();
        }
    }
}

/// Source allowlist: `None` admits every source.
pub fn admitted(allowlist: Option<&[String]>, source_id: &str) -> bool {
    allowlist.map_or(true, |ids| ids.iter().any(|id| id == source_id))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryIndex {
    entries: BTreeMap<String, BTreeMap<String, HistoryEntry>>,
    names: BTreeMap<String, String>,
    order: Vec<String>,
    latest: Option<NaiveTime>,
}

impl HistoryIndex {
    /// Fold `snapshots` (chronological) into an index, keeping only admitted sources.
    pub fn build(snapshots: &[Snapshot], allowlist: Option<&[String]>) -> Self {
        let mut idx = Self::default();
        for snap in snapshots {
            idx.fold(snap, allowlist);
        }
        idx
    }

    pub fn fold(&mut self, snap: &Snapshot, allowlist: Option<&[String]>) {
        for src in snap.sources.iter().filter(|s| admitted(allowlist, &s.id)) {
            if !self.entries.contains_key(&src.id) {
                self.order.push(src.id.clone());
            }
            self.names.insert(src.id.clone(), src.name.clone());
            let titles = self.entries.entry(src.id.clone()).or_default();
            for (title, obs) in &src.titles {
                titles
                    .entry(title.clone())
                    .and_modify(|e| e.merge(snap.time, obs))
                    .or_insert_with(|| HistoryEntry::first_sighting(snap.time, obs));
            }
        }
        self.latest = Some(self.latest.map_or(snap.time, |t| t.max(snap.time)));
    }

    pub fn get(&self, source_id: &str, title: &str) -> Option<&HistoryEntry> {
        self.entries.get(source_id)?.get(title)
    }

    /// Sources in first-seen order.
    pub fn sources(&self) -> &[String] {
        &self.order
    }

    pub fn titles(&self, source_id: &str) -> impl Iterator<Item = (&String, &HistoryEntry)> {
        self.entries.get(source_id).into_iter().flatten()
    }

    pub fn source_name<'a>(&'a self, source_id: &'a str) -> &'a str {
        self.names
            .get(source_id)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(source_id)
    }

    /// Time of the most recent folded snapshot.
    pub fn latest_time(&self) -> Option<NaiveTime> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
