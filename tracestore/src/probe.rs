//! Producer-side request samples and resource usage probes.
//!
//! The host hands the store a [`RequestSample`] at the end of every request.
//! Peak memory and query counts are filled in by a [`UsageProbe`] at write
//! time, so the host does not need to know how they are measured. A host that
//! talks to a database implements the trait over its own per-request counter.

use records::{EventRecord, RequestType};

/// What the host knows about a finished request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSample {
    pub session: String,
    pub start_time: f64,
    pub end_time: f64,
    pub request_type: RequestType,
    pub path: String,
    pub had_fatal_error: bool,
}

impl RequestSample {
    /// Complete the sample into a storable record.
    ///
    /// An end time earlier than the start (clock step) is clamped to the start.
    #[must_use]
    pub fn into_record(self, probe: &dyn UsageProbe) -> EventRecord {
        EventRecord {
            session: self.session,
            start_time: self.start_time,
            end_time: self.end_time.max(self.start_time),
            request_type: self.request_type,
            path: self.path,
            had_fatal_error: self.had_fatal_error,
            peak_memory_mb: probe.peak_memory_mb(),
            db_query_count: probe.db_query_count(),
        }
    }
}

/// Source of the per-request resource counters stored with each record.
pub trait UsageProbe: Send + Sync {
    fn peak_memory_mb(&self) -> u64;
    fn db_query_count(&self) -> u64;
}

/// Memory-only probe backed by the current process.
///
/// Peak memory is the process high-water resident set size (Linux only; 0
/// elsewhere). The query count is always 0: this probe has no view of any
/// database the host may use.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessUsage;

impl ProcessUsage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UsageProbe for ProcessUsage {
    fn peak_memory_mb(&self) -> u64 {
        peak_rss_kib().map_or(0, |kib| (kib + 512) / 1024)
    }

    fn db_query_count(&self) -> u64 {
        0
    }
}

/// Probe returning fixed values (CLI input, tests).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedUsage {
    pub peak_memory_mb: u64,
    pub db_query_count: u64,
}

impl UsageProbe for FixedUsage {
    fn peak_memory_mb(&self) -> u64 {
        self.peak_memory_mb
    }

    fn db_query_count(&self) -> u64 {
        self.db_query_count
    }
}

#[cfg(target_os = "linux")]
fn peak_rss_kib() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

#[cfg(not(target_os = "linux"))]
fn peak_rss_kib() -> Option<u64> {
    None
}

// "VmHWM:\t   12345 kB"
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

#[cfg(test)]
#[path = "probe_test.rs"]
mod tests;
