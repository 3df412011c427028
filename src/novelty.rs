// src/novelty.rs
use std::collections::{BTreeMap, HashSet};

use crate::history::admitted;
use crate::snapshot::{Snapshot, TitleObservation};

/// `source_id -> title -> observation in the latest snapshot`.
pub type NewTitles = BTreeMap<String, BTreeMap<String, TitleObservation>>;

/// Titles in the latest snapshot that no earlier snapshot of the day carried.
///
/// With fewer than two snapshots there is no baseline and the result is empty;
/// callers treat the first crawl of a day as "everything is new" themselves.
pub fn detect_new_titles(snapshots: &[Snapshot], allowlist: Option<&[String]>) -> NewTitles {
    let Some((latest, earlier)) = snapshots.split_last() else {
        return NewTitles::new();
    };
    if earlier.is_empty() {
        return NewTitles::new();
    }

    let seen: HashSet<(&str, &str)> = earlier
        .iter()
        .flat_map(|s| s.sources.iter())
        .filter(|src| admitted(allowlist, &src.id))
        .flat_map(|src| src.titles.keys().map(move |t| (src.id.as_str(), t.as_str())))
        .collect();

    let mut out = NewTitles::new();
    for src in latest.sources.iter().filter(|s| admitted(allowlist, &s.id)) {
        let fresh: BTreeMap<String, TitleObservation> = src
            .titles
            .iter()
            .filter(|(t, _)| !seen.contains(&(src.id.as_str(), t.as_str())))
            .map(|(t, o)| (t.clone(), o.clone()))
            .collect();
        if !fresh.is_empty() {
            out.insert(src.id.clone(), fresh);
        }
    }
    out
}

/// Everything in `snap`, for the first crawl of a day.
pub fn all_titles(snap: &Snapshot, allowlist: Option<&[String]>) -> NewTitles {
    snap.sources
        .iter()
        .filter(|s| admitted(allowlist, &s.id) && !s.titles.is_empty())
        .map(|s| (s.id.clone(), s.titles.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SourceSection;
    use chrono::NaiveTime;

    fn snap(h: u32, titles: &[(&str, &str)]) -> Snapshot {
        let mut s = Snapshot::new(NaiveTime::from_hms_opt(h, 0, 0).unwrap());
        for (src, title) in titles {
            if s.source(src).is_none() {
                s.sources.push(SourceSection::new(*src, *src));
            }
            s.sources
                .iter_mut()
                .find(|x| x.id == *src)
                .unwrap()
                .observe(title, 1, "", "");
        }
        s
    }

    #[test]
    fn single_snapshot_has_no_baseline() {
        assert!(detect_new_titles(&[snap(8, &[("a", "X")])], None).is_empty());
        assert!(detect_new_titles(&[], None).is_empty());
    }

    #[test]
    fn compares_against_union_of_earlier() {
        let snaps = vec![
            snap(8, &[("a", "X")]),
            snap(9, &[("a", "Y")]),
            snap(10, &[("a", "X"), ("a", "Y"), ("a", "Z"), ("b", "X")]),
        ];
        let new = detect_new_titles(&snaps, None);
        assert_eq!(new["a"].keys().collect::<Vec<_>>(), ["Z"]);
        // same title under another source is still new there
        assert!(new["b"].contains_key("X"));
    }

    #[test]
    fn source_added_midday_is_all_new() {
        let snaps = vec![snap(8, &[("a", "X"), ("b", "Q")]), snap(9, &[("a", "X"), ("b", "Q")])];
        let before = vec!["a".to_string()];
        assert!(detect_new_titles(&snaps, Some(&before)).is_empty());
        let after = vec!["a".to_string(), "c".to_string()];
        let snaps2 = vec![snaps[0].clone(), snap(9, &[("a", "X"), ("c", "W")])];
        let new = detect_new_titles(&snaps2, Some(&after));
        assert_eq!(new.len(), 1);
        assert!(new["c"].contains_key("W"));
    }
}
