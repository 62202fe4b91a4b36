//! Per-run context: identity, clock and reference data for one pipeline run.
//!
//! Computed once at the start of a run and handed to every stage, so no stage
//! reads the wall clock on its own.

use crate::reference::ReferenceTables;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// Trailing order window `(start, end)`, both exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Window of `days` ending at `end`
    pub fn trailing(end: NaiveDateTime, days: i64) -> Self {
        TimeWindow {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at > self.start && at < self.end
    }

    pub fn start_date(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_date(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// `2024-03-20T10:00:00`
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    /// `2024-03-20T10:00:00.000Z`
    pub fn start_iso_millis_z(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// `2024-03-20T10:00:00+00:00`
    pub fn start_iso_utc_offset(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
    }

    /// `2024-03-27 10:00:00+00:00`
    pub fn end_space_utc_offset(&self) -> String {
        self.end.format("%Y-%m-%d %H:%M:%S+00:00").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub window: TimeWindow,
    pub references: ReferenceTables,
}

impl RunContext {
    pub fn new(now: NaiveDateTime, window_days: i64, references: ReferenceTables) -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            window: TimeWindow::trailing(now, window_days),
            references,
        }
    }

    /// Context anchored at the local wall clock
    pub fn starting_now(window_days: i64, references: ReferenceTables) -> Self {
        RunContext::new(Local::now().naive_local(), window_days, references)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.window.end
    }

    pub fn report_date(&self) -> NaiveDate {
        self.window.end.date()
    }

    /// `10-19-2026` - stem of every dated report file
    pub fn date_stamp(&self) -> String {
        self.report_date().format("%m-%d-%Y").to_string()
    }

    /// Full month name, e.g. `October`
    pub fn month_name(&self) -> String {
        self.report_date().format("%B").to_string()
    }
}
