//! Timeline layout for trace records.
//!
//! Turns the records of a query window into per-session rows of
//! non-overlapping intervals, then flattens them into one coordinate space a
//! chart renderer can draw directly. No I/O and no rendering framework here.

mod layout;
mod packer;

pub use layout::{
    Bounds, Lane, SessionTimeline, TimelinePayload, assemble, build_timeline, canvas_height, point_size,
    row_label,
};
pub use packer::{RowPacker, SessionRows, pack_sessions};

use records::{EventRecord, RequestType};
use serde::Serialize;

/// Color used for any request that ended in a fatal error.
pub const ERROR_COLOR: &str = "#f00";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TypeDisplay {
    pub label: &'static str,
    pub color: &'static str,
}

#[must_use]
pub fn type_display(request_type: RequestType) -> TypeDisplay {
    let color = match request_type {
        RequestType::Page => "#68f",
        RequestType::NotFound => "#c8c",
        RequestType::Ajax => "#cc0",
        RequestType::Rest => "#c80",
        RequestType::Cron => "#999",
        RequestType::Login => "#2c2",
        RequestType::System => "#d0f",
    };
    TypeDisplay { label: request_type.name(), color }
}

/// One interval as placed on the timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub start_time: f64,
    pub end_time: f64,
    pub request_type: RequestType,
    pub path: String,
    pub had_fatal_error: bool,
    pub peak_memory_mb: u64,
    pub db_query_count: u64,
    pub color: &'static str,
}

impl From<&EventRecord> for TimelineEvent {
    fn from(record: &EventRecord) -> Self {
        let color = if record.had_fatal_error {
            ERROR_COLOR
        } else {
            type_display(record.request_type).color
        };
        Self {
            start_time: record.start_time,
            end_time: record.end_time,
            request_type: record.request_type,
            path: record.path.clone(),
            had_fatal_error: record.had_fatal_error,
            peak_memory_mb: record.peak_memory_mb,
            db_query_count: record.db_query_count,
            color,
        }
    }
}

/// Serialize a payload for embedding in a page or API response.
///
/// # Errors
///
/// Returns the `serde_json` error if serialization fails.
pub fn to_json(payload: &TimelinePayload) -> Result<String, serde_json::Error> {
    serde_json::to_string(payload)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
