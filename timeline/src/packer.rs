//! First-fit interval packing into display rows.
//!
//! DESIGN
//! ======
//! Records arrive in file order. Each one goes to the lowest-numbered row of
//! its session whose last interval ended at or before the new start; if none
//! fits a new row is opened. Cost is O(n * r) with r the rows open for the
//! session, which stays small because per-session concurrency is shallow.
//!
//! Touching intervals (`end == next start`) share a row.

use std::collections::HashMap;

use records::EventRecord;
use serde::Serialize;

use crate::TimelineEvent;

/// Online row assignment for one session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowPacker {
    row_ends: Vec<f64>,
}

impl RowPacker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `[start, end]` to a row and return the row index.
    pub fn place(&mut self, start: f64, end: f64) -> usize {
        if let Some(row) = self.row_ends.iter().position(|&row_end| row_end <= start) {
            self.row_ends[row] = end;
            return row;
        }
        self.row_ends.push(end);
        self.row_ends.len() - 1
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_ends.len()
    }
}

/// A session's intervals split into non-overlapping rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionRows {
    pub session: String,
    pub rows: Vec<Vec<TimelineEvent>>,
}

impl SessionRows {
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Group records by session (first-seen order) and pack each session's rows.
#[must_use]
pub fn pack_sessions(records: &[EventRecord]) -> Vec<SessionRows> {
    let mut index = HashMap::<&str, usize>::new();
    let mut packers = Vec::<RowPacker>::new();
    let mut sessions = Vec::<SessionRows>::new();

    for record in records {
        let slot = *index.entry(record.session.as_str()).or_insert_with(|| {
            sessions.push(SessionRows { session: record.session.clone(), rows: Vec::new() });
            packers.push(RowPacker::new());
            sessions.len() - 1
        });

        let packer = &mut packers[slot];
        let row = packer.place(record.start_time, record.end_time);
        let rows = &mut sessions[slot].rows;
        if rows.len() < packer.row_count() {
            rows.push(Vec::new());
        }
        rows[row].push(TimelineEvent::from(record));
    }

    sessions
}

#[cfg(test)]
#[path = "packer_test.rs"]
mod tests;
