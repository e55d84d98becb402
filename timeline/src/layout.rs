//! Flatten packed sessions into one chart coordinate space.
//!
//! Every `(session, row)` pair becomes a [`Lane`] with its own integer `y`,
//! counting down from 0 so sessions stack top to bottom with their rows kept
//! together. Bounds cover every placed interval; an empty window falls back
//! to the day ending at `now`.

use records::EventRecord;
use serde::Serialize;

use crate::TimelineEvent;
use crate::packer::{SessionRows, pack_sessions};

const EMPTY_WINDOW_SECS: f64 = 86_400.0;
const EMPTY_PADDING_SPAN_SECS: f64 = 3_600.0;
const LABEL_FALLBACK_CHARS: usize = 7;
const MAX_POINT_SIZE: u32 = 16;
const MIN_POINT_SIZE: u32 = 6;
const TICKS_PER_POINT_STEP: usize = 30;
const MIN_CANVAS_HEIGHT: u64 = 100;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Lane {
    pub y: i64,
    pub label: String,
    pub events: Vec<TimelineEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionTimeline {
    pub session: String,
    pub lanes: Vec<Lane>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: i64,
    pub max_y: i64,
}

impl Bounds {
    /// Time axis limits widened by a tenth of the span on each side.
    #[must_use]
    pub fn padded_x(&self, has_data: bool) -> (f64, f64) {
        let span = if has_data { self.max_x - self.min_x } else { EMPTY_PADDING_SPAN_SECS };
        let pad = span / 10.0;
        (self.min_x - pad, self.max_x + pad)
    }
}

/// Everything the chart renderer needs for one window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelinePayload {
    pub sessions: Vec<SessionTimeline>,
    pub bounds: Bounds,
    /// Time axis limits for the renderer: `bounds` padded on both sides.
    pub x_limits: (f64, f64),
    /// Total number of events placed.
    pub ticks: usize,
    pub point_size: u32,
    /// One marker height per lane above a fixed base.
    pub canvas_height: u64,
    /// The query hit its fetch limit; older-than-shown data may be missing.
    pub truncated: bool,
}

impl TimelinePayload {
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.sessions.iter().map(|s| s.lanes.len()).sum()
    }
}

/// Pack `records` per session and lay them out.
#[must_use]
pub fn build_timeline(records: &[EventRecord], now: f64, truncated: bool) -> TimelinePayload {
    assemble(pack_sessions(records), now, truncated)
}

/// Assign lane coordinates and compute bounds and sizing hints.
#[must_use]
pub fn assemble(sessions: Vec<SessionRows>, now: f64, truncated: bool) -> TimelinePayload {
    let mut y = 0i64;
    let mut ticks = 0usize;
    let mut time_range: Option<(f64, f64)> = None;
    let mut y_range: Option<(i64, i64)> = None;
    let mut out = Vec::with_capacity(sessions.len());

    for packed in sessions {
        ticks += packed.event_count();
        let SessionRows { session, rows } = packed;
        let label = row_label(&session);
        let mut lanes = Vec::with_capacity(rows.len());
        for events in rows {
            for event in &events {
                time_range = Some(match time_range {
                    Some((lo, hi)) => (lo.min(event.start_time), hi.max(event.end_time)),
                    None => (event.start_time, event.end_time),
                });
            }
            y_range = Some(y_range.map_or((y, y), |(lo, hi)| (lo.min(y), hi.max(y))));
            lanes.push(Lane { y, label: label.clone(), events });
            y -= 1;
        }
        out.push(SessionTimeline { session, lanes });
    }

    let has_data = time_range.is_some();
    let (min_x, max_x) = time_range.unwrap_or((now - EMPTY_WINDOW_SECS, now));
    let (min_y, max_y) = y_range.unwrap_or((0, 0));
    let bounds = Bounds { min_x, max_x, min_y, max_y };

    let mut payload = TimelinePayload {
        sessions: out,
        bounds,
        x_limits: bounds.padded_x(has_data),
        ticks,
        point_size: point_size(ticks),
        canvas_height: MIN_CANVAS_HEIGHT,
        truncated,
    };
    payload.canvas_height = canvas_height(payload.lane_count(), payload.point_size);
    payload
}

/// Short axis label for a session key.
///
/// `user:#3(alice)` becomes `user:#3`; keys without a parenthetical keep their
/// first seven characters followed by `..`.
#[must_use]
pub fn row_label(session: &str) -> String {
    match session.split_once('(') {
        Some((head, _)) => head.trim_end().to_owned(),
        None => {
            let head = session.chars().take(LABEL_FALLBACK_CHARS).collect::<String>();
            format!("{head}..")
        }
    }
}

/// Marker size hint: shrinks by one for every 30 events, never below 6.
#[must_use]
pub fn point_size(ticks: usize) -> u32 {
    let step = u32::try_from(ticks / TICKS_PER_POINT_STEP).unwrap_or(u32::MAX);
    MAX_POINT_SIZE.saturating_sub(step).max(MIN_POINT_SIZE)
}

/// Canvas height hint: a 100px base plus one marker height per lane.
#[must_use]
pub fn canvas_height(lanes: usize, point_size: u32) -> u64 {
    let lanes = u64::try_from(lanes).unwrap_or(u64::MAX);
    MIN_CANVAS_HEIGHT
        .saturating_add(lanes.saturating_mul(u64::from(point_size)))
        .max(MIN_CANVAS_HEIGHT)
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
