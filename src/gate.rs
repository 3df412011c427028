// src/gate.rs
//! Dispatch gating: time-of-day window and once-per-day push records.
//! - `should_push` never mutates state.
//! - State is written explicitly via `record_push` after a successful send.

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike};

use crate::config::PushWindowSection;
use crate::error::{Result, TrendError};
use crate::store::{prune_push_records, read_push_record, write_push_record, DayStore, PushRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushWindow {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub once_per_day: bool,
    pub retention_days: u32,
}

fn parse_hhmm(field: &str, s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| TrendError::config(format!("push_window.{field} must be HH:MM, got '{s}'")))
}

impl PushWindow {
    pub fn from_section(s: &PushWindowSection) -> Result<Self> {
        Ok(Self {
            enabled: s.enabled,
            start: parse_hhmm("start", &s.start)?,
            end: parse_hhmm("end", &s.end)?,
            once_per_day: s.once_per_day,
            retention_days: s.record_retention_days,
        })
    }

    /// Inclusive on both ends, at minute granularity. `start > end` wraps past midnight.
    pub fn contains(&self, t: NaiveTime) -> bool {
        let minute = |t: NaiveTime| t.hour() * 60 + t.minute();
        let (s, e, now) = (minute(self.start), minute(self.end), minute(t));
        if s <= e {
            (s..=e).contains(&now)
        } else {
            now >= s || now <= e
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    OutsideWindow,
    AlreadyPushed,
}

pub struct PushGate<'a> {
    window: PushWindow,
    store: &'a dyn DayStore,
}

impl<'a> PushGate<'a> {
    pub fn new(window: PushWindow, store: &'a dyn DayStore) -> Self {
        Self { window, store }
    }

    pub fn window(&self) -> &PushWindow {
        &self.window
    }

    /// Check whether a dispatch may happen at `now`. Does NOT mutate state.
    pub fn should_push(&self, now: DateTime<FixedOffset>) -> Result<GateDecision> {
        if self.window.enabled && !self.window.contains(now.time()) {
            return Ok(GateDecision::OutsideWindow);
        }
        if self.window.once_per_day {
            let day = now.date_naive();
            // An unreadable record counts as not pushed; the next success rewrites it.
            let pushed = match read_push_record(self.store, day) {
                Ok(rec) => rec.is_some_and(|r| r.pushed),
                Err(e) => {
                    tracing::warn!(error = ?e, %day, "unreadable push record, treating day as not pushed");
                    false
                }
            };
            if pushed {
                return Ok(GateDecision::AlreadyPushed);
            }
        }
        Ok(GateDecision::Open)
    }

    /// Record that today's push happened. Only meaningful with once-per-day on.
    pub fn record_push(&self, now: DateTime<FixedOffset>, report_type: &str) -> Result<()> {
        if !self.window.once_per_day {
            return Ok(());
        }
        let rec = PushRecord {
            pushed: true,
            push_time: Some(now),
            report_type: Some(report_type.to_string()),
        };
        write_push_record(self.store, now.date_naive(), &rec)?;
        tracing::info!(day = %now.date_naive(), report_type, "push recorded");
        Ok(())
    }

    /// Drop records older than the retention period.
    pub fn prune(&self, now: DateTime<FixedOffset>) -> Result<usize> {
        prune_push_records(self.store, now.date_naive(), self.window.retention_days)
    }
}
