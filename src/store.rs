// src/store.rs
//! Day-scoped key/value storage for snapshots and push records.
//!
//! Keys are `(space, day, slot)`. One process is the only writer for a given day,
//! so there is no cross-process locking.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TrendError};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Space {
    Snapshots,
    PushRecords,
}

pub const PUSH_RECORD_SLOT: &str = "record";

pub trait DayStore: Send + Sync {
    fn put(&self, space: Space, day: NaiveDate, slot: &str, body: &str) -> Result<()>;
    fn get(&self, space: Space, day: NaiveDate, slot: &str) -> Result<Option<String>>;
    /// Slots of `day`, sorted ascending.
    fn slots(&self, space: Space, day: NaiveDate) -> Result<Vec<String>>;
    /// Days holding at least one slot, sorted ascending.
    fn days(&self, space: Space) -> Result<Vec<NaiveDate>>;
    fn remove_day(&self, space: Space, day: NaiveDate) -> Result<()>;
}

/// In-process store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<(Space, NaiveDate), BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(Space, NaiveDate), BTreeMap<String, String>>> {
        // A poisoned map is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DayStore for MemoryStore {
    fn put(&self, space: Space, day: NaiveDate, slot: &str, body: &str) -> Result<()> {
        self.lock()
            .entry((space, day))
            .or_default()
            .insert(slot.to_string(), body.to_string());
        Ok(())
    }

    fn get(&self, space: Space, day: NaiveDate, slot: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .get(&(space, day))
            .and_then(|m| m.get(slot).cloned()))
    }

    fn slots(&self, space: Space, day: NaiveDate) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .get(&(space, day))
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn days(&self, space: Space) -> Result<Vec<NaiveDate>> {
        Ok(self
            .lock()
            .iter()
            .filter(|((s, _), m)| *s == space && !m.is_empty())
            .map(|((_, d), _)| *d)
            .collect())
    }

    fn remove_day(&self, space: Space, day: NaiveDate) -> Result<()> {
        self.lock().remove(&(space, day));
        Ok(())
    }
}

/// On-disk layout:
/// - snapshots: `<root>/<YYYY-MM-DD>/txt/<slot>.txt`
/// - push records: `<root>/.push_records/push_record_<YYYYMMDD>.json`
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_dir(&self, day: NaiveDate) -> PathBuf {
        self.root.join(day.format("%Y-%m-%d").to_string()).join("txt")
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join(".push_records")
    }

    fn record_path(&self, day: NaiveDate) -> PathBuf {
        self.records_dir()
            .join(format!("push_record_{}.json", day.format("%Y%m%d")))
    }

    fn path_for(&self, space: Space, day: NaiveDate, slot: &str) -> PathBuf {
        match space {
            Space::Snapshots => self.snapshot_dir(day).join(format!("{slot}.txt")),
            Space::PushRecords => self.record_path(day),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn list_dir(path: &Path) -> Result<Vec<String>> {
    match fs::read_dir(path) {
        Ok(rd) => {
            let mut names = Vec::new();
            for entry in rd {
                names.push(entry?.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl DayStore for FsStore {
    fn put(&self, space: Space, day: NaiveDate, slot: &str, body: &str) -> Result<()> {
        let path = self.path_for(space, day, slot);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
        Ok(())
    }

    fn get(&self, space: Space, day: NaiveDate, slot: &str) -> Result<Option<String>> {
        read_optional(&self.path_for(space, day, slot))
    }

    fn slots(&self, space: Space, day: NaiveDate) -> Result<Vec<String>> {
        match space {
            Space::Snapshots => Ok(list_dir(&self.snapshot_dir(day))?
                .into_iter()
                .filter_map(|n| n.strip_suffix(".txt").map(str::to_string))
                .collect()),
            Space::PushRecords => Ok(if self.record_path(day).exists() {
                vec![PUSH_RECORD_SLOT.to_string()]
            } else {
                Vec::new()
            }),
        }
    }

    fn days(&self, space: Space) -> Result<Vec<NaiveDate>> {
        let mut days: Vec<NaiveDate> = match space {
            Space::Snapshots => list_dir(&self.root)?
                .iter()
                .filter_map(|n| NaiveDate::parse_from_str(n, "%Y-%m-%d").ok())
                .collect(),
            Space::PushRecords => list_dir(&self.records_dir())?
                .iter()
                .filter_map(|n| {
                    let stamp = n.strip_prefix("push_record_")?.strip_suffix(".json")?;
                    NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()
                })
                .collect(),
        };
        days.sort();
        Ok(days)
    }

    fn remove_day(&self, space: Space, day: NaiveDate) -> Result<()> {
        let res = match space {
            Space::Snapshots => fs::remove_dir_all(self.snapshot_dir(day)),
            Space::PushRecords => fs::remove_file(self.record_path(day)),
        };
        match res {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ---- snapshots ----

pub fn snapshot_slot(time: NaiveTime) -> String {
    time.format("%H-%M").to_string()
}

/// Write `snap` into its `HH-MM` slot. Snapshots are immutable: when the slot
/// is already taken the stored one is kept and `false` is returned.
pub fn append_snapshot(store: &dyn DayStore, day: NaiveDate, snap: &Snapshot) -> Result<bool> {
    let slot = snapshot_slot(snap.time);
    if store.get(Space::Snapshots, day, &slot)?.is_some() {
        tracing::warn!(%day, slot, "snapshot slot already written, keeping the stored one");
        return Ok(false);
    }
    store.put(Space::Snapshots, day, &slot, &snap.render())?;
    Ok(true)
}

/// All snapshots of `day` in chronological order. Slots that are not `HH-MM`
/// are ignored.
pub fn load_day(store: &dyn DayStore, day: NaiveDate) -> Result<Vec<Snapshot>> {
    let mut out = Vec::new();
    for slot in store.slots(Space::Snapshots, day)? {
        let Ok(time) = NaiveTime::parse_from_str(&slot, "%H-%M") else {
            tracing::warn!(%day, slot, "ignoring snapshot with unrecognised name");
            continue;
        };
        let Some(body) = store.get(Space::Snapshots, day, &slot)? else {
            continue;
        };
        let (snap, _skipped) = Snapshot::parse(time, &body);
        out.push(snap);
    }
    out.sort_by_key(|s| s.time);
    Ok(out)
}

// ---- push records ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    pub pushed: bool,
    pub push_time: Option<DateTime<FixedOffset>>,
    pub report_type: Option<String>,
}

pub fn read_push_record(store: &dyn DayStore, day: NaiveDate) -> Result<Option<PushRecord>> {
    match store.get(Space::PushRecords, day, PUSH_RECORD_SLOT)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            TrendError::parse(format!("push record {day}"), e.to_string())
        }),
    }
}

pub fn write_push_record(store: &dyn DayStore, day: NaiveDate, rec: &PushRecord) -> Result<()> {
    let body = serde_json::to_string_pretty(rec)?;
    store.put(Space::PushRecords, day, PUSH_RECORD_SLOT, &body)
}

/// Drop push records older than `retention_days` before `today`.
pub fn prune_push_records(
    store: &dyn DayStore,
    today: NaiveDate,
    retention_days: u32,
) -> Result<usize> {
    let cutoff = today - chrono::Duration::days(i64::from(retention_days));
    let mut removed = 0;
    for day in store.days(Space::PushRecords)? {
        if day < cutoff {
            store.remove_day(Space::PushRecords, day)?;
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, %cutoff, "pruned old push records");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SourceSection;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn snap(h: u32, m: u32, title: &str) -> Snapshot {
        let mut s = Snapshot::new(NaiveTime::from_hms_opt(h, m, 0).unwrap());
        let mut src = SourceSection::new("hn", "Hacker News");
        src.observe(title, 1, "", "");
        s.sources.push(src);
        s
    }

    fn exercise(store: &dyn DayStore) {
        append_snapshot(store, day(1), &snap(10, 5, "late")).unwrap();
        append_snapshot(store, day(1), &snap(9, 0, "early")).unwrap();
        let loaded = load_day(store, day(1)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].source("hn").unwrap().titles.contains_key("early"));
        assert!(load_day(store, day(2)).unwrap().is_empty());

        assert_eq!(read_push_record(store, day(1)).unwrap(), None);
        for d in [1, 5, 9] {
            let rec = PushRecord {
                pushed: true,
                push_time: None,
                report_type: Some("Daily Summary".into()),
            };
            write_push_record(store, day(d), &rec).unwrap();
        }
        assert!(read_push_record(store, day(9)).unwrap().unwrap().pushed);
        assert_eq!(prune_push_records(store, day(10), 7).unwrap(), 1);
        assert_eq!(store.days(Space::PushRecords).unwrap(), vec![day(5), day(9)]);
    }

    #[test]
    fn memory_store_behaves() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn fs_store_behaves() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        exercise(&store);
        assert!(dir.path().join("2025-03-01/txt/09-00.txt").exists());
        assert!(dir.path().join(".push_records/push_record_20250309.json").exists());
    }
}
