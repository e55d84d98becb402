//! Event record model and line format for the loadgraph trace log.
//!
//! This crate owns the on-disk representation shared by `tracestore`,
//! `timeline`, the host service and the CLI. A record is one completed
//! request; it serializes to exactly eight tab-separated fields which are then
//! obfuscated by [`Keystream`] before being appended to the log.

mod codec;

pub use codec::{CodecError, KEYSTREAM_LEN, Keystream};

use serde::{Deserialize, Serialize};

/// Number of tab-separated fields in a serialized record.
pub const FIELD_COUNT: usize = 8;

const FIELD_SEPARATOR: char = '\t';

/// Error returned by [`parse_record`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    /// The line did not split into exactly [`FIELD_COUNT`] fields.
    #[error("expected 8 fields, found {0}")]
    FieldCount(usize),
    /// A numeric or flag field could not be parsed.
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },
    /// The request type code does not map to a known [`RequestType`].
    #[error("unknown request type code: {0}")]
    UnknownRequestType(u8),
}

/// Classification of a served request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Page,
    #[serde(rename = "404")]
    NotFound,
    Ajax,
    Rest,
    Cron,
    Login,
    System,
}

impl RequestType {
    /// Every request type, in wire-code order.
    pub const ALL: [Self; 7] = [
        Self::Page,
        Self::NotFound,
        Self::Ajax,
        Self::Rest,
        Self::Cron,
        Self::Login,
        Self::System,
    ];

    /// Numeric code written to the log line.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Page => 1,
            Self::NotFound => 2,
            Self::Ajax => 3,
            Self::Rest => 4,
            Self::Cron => 5,
            Self::Login => 6,
            Self::System => 7,
        }
    }

    /// Parse a request type from its log code.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownRequestType`] for codes outside `1..=7`.
    pub fn from_code(code: u8) -> Result<Self, RecordError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(RecordError::UnknownRequestType(code))
    }

    /// Short display name used by the rendering payload.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::NotFound => "404",
            Self::Ajax => "ajax",
            Self::Rest => "rest",
            Self::Cron => "cron",
            Self::Login => "login",
            Self::System => "system",
        }
    }
}

/// One completed request, as stored in the trace log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Grouping key: logged-in user identity or anonymous fingerprint.
    pub session: String,
    /// Request start, fractional seconds since the Unix epoch.
    pub start_time: f64,
    /// Request end, fractional seconds since the Unix epoch.
    pub end_time: f64,
    pub request_type: RequestType,
    /// Free-text request identifier (URI plus optional action suffix).
    pub path: String,
    pub had_fatal_error: bool,
    pub peak_memory_mb: u64,
    pub db_query_count: u64,
}

impl EventRecord {
    /// Wall-clock duration of the request in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Serialize a record into its plaintext log line (no trailing newline).
///
/// Field order: session, start, end, type code, error flag, memory, queries,
/// path. Separator and newline characters inside free-text fields are replaced
/// by spaces so the line always splits back into [`FIELD_COUNT`] fields.
#[must_use]
pub fn serialize_record(record: &EventRecord) -> String {
    format!(
        "{session}\t{start:.3}\t{end:.3}\t{kind}\t{error}\t{mem}\t{db}\t{path}",
        session = sanitize_field(&record.session),
        start = record.start_time,
        end = record.end_time,
        kind = record.request_type.code(),
        error = u8::from(record.had_fatal_error),
        mem = record.peak_memory_mb,
        db = record.db_query_count,
        path = sanitize_field(&record.path),
    )
}

/// Parse a plaintext log line back into a record.
///
/// # Errors
///
/// Returns [`RecordError::FieldCount`] when the line is not made of exactly
/// [`FIELD_COUNT`] fields, and [`RecordError::InvalidField`] or
/// [`RecordError::UnknownRequestType`] when a field does not parse.
pub fn parse_record(line: &str) -> Result<EventRecord, RecordError> {
    let fields = line.split(FIELD_SEPARATOR).collect::<Vec<_>>();
    let [session, start, end, kind, error, mem, db, path] = fields.as_slice() else {
        return Err(RecordError::FieldCount(fields.len()));
    };

    let code = parse_field::<u8>("type", kind)?;
    Ok(EventRecord {
        session: (*session).to_owned(),
        start_time: parse_timestamp("start", start)?,
        end_time: parse_timestamp("end", end)?,
        request_type: RequestType::from_code(code)?,
        path: (*path).to_owned(),
        had_fatal_error: parse_field::<u8>("error", error)? != 0,
        peak_memory_mb: parse_field("memory", mem)?,
        db_query_count: parse_field("queries", db)?,
    })
}

fn sanitize_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, RecordError> {
    raw.parse::<T>().map_err(|_| RecordError::InvalidField { field, value: raw.to_owned() })
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<f64, RecordError> {
    let value = parse_field::<f64>(field, raw)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RecordError::InvalidField { field, value: raw.to_owned() })
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
