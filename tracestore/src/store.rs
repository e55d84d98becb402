//! Flat-file trace log: append, windowed query, size-bounded rotation.
//!
//! DESIGN
//! ======
//! One obfuscated record per line in `<dir>/<key fingerprint>.log`. Lines are
//! appended in wall-clock write order, which is request *end* order. Queries
//! treat that as start-time order and stop at the first record past the
//! window, so two overlapping requests that finished out of start order can
//! hide a record near the upper bound. The file is never re-sorted.
//!
//! ERROR HANDLING
//! ==============
//! I/O failures are returned to the caller. Corrupt lines (torn writes, other
//! keys, bad fields) are skipped during queries and never surfaced. A missing
//! log file reads as empty. Callers on the request path use
//! [`TraceStore::record_best_effort`], which logs failures and swallows them.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use records::{EventRecord, Keystream, parse_record, serialize_record};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::probe::{RequestSample, UsageProbe};

const HTACCESS_FILE: &str = ".htaccess";
const HTACCESS_BODY: &str = "Options -Indexes\nDeny from all";
const INDEX_FILE: &str = "index.html";
const INDEX_BODY: &str = "<!-- Silence is golden -->\n";
const ROTATE_SUFFIX: &str = "rotate";
/// 1 MiB copy chunk.
const COPY_CHUNK_BYTES: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not move rotated log into place at {}: {source}", .path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> StoreError + 'a {
    move |source| StoreError::Io { op, path: path.to_path_buf(), source }
}

/// Records accepted by a query, in on-disk order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub records: Vec<EventRecord>,
    /// More in-window records existed beyond the fetch limit.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RotateOutcome {
    /// File was under the limit (or absent); nothing changed.
    Skipped { size: u64 },
    /// File was trimmed from the head.
    Rotated { before: u64, after: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: u64,
}

/// Owner of one trace log file.
#[derive(Debug, Clone)]
pub struct TraceStore {
    dir: PathBuf,
    path: PathBuf,
    keystream: Keystream,
}

impl TraceStore {
    /// Store rooted at `dir`; the file name is derived from the keystream.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, keystream: Keystream) -> Self {
        let dir = dir.into();
        let path = dir.join(format!("{}.log", keystream.fingerprint()));
        Self { dir, path, keystream }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory, marker files and log file if they are missing.
    ///
    /// Safe to call repeatedly: existing markers are left alone and the log
    /// is never truncated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if any of the files cannot be created.
    pub fn initialize(&self) -> Result<(), StoreError> {
        create_private_dir(&self.dir).map_err(io_err("create directory", &self.dir))?;

        for (name, body) in [(HTACCESS_FILE, HTACCESS_BODY), (INDEX_FILE, INDEX_BODY)] {
            let marker = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&marker) {
                Ok(mut file) => file
                    .write_all(body.as_bytes())
                    .map_err(io_err("write marker", &marker))?,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(io_err("create marker", &marker)(e)),
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err("create log", &self.path))?;

        info!(path = %self.path.display(), "trace store initialized");
        Ok(())
    }

    /// Remove the data directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory exists but cannot be removed.
    pub fn teardown(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(dir = %self.dir.display(), "trace store removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove directory", &self.dir)(e)),
        }
    }

    /// Append one record as a single obfuscated line.
    ///
    /// The whole line goes out in one `write` on an append-mode handle so
    /// concurrent writers interleave at line granularity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the log cannot be opened or written.
    pub fn append(&self, record: &EventRecord) -> Result<(), StoreError> {
        let mut line = self.keystream.encode_line(&serialize_record(record));
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err("open log", &self.path))?;
        file.write_all(line.as_bytes()).map_err(io_err("append to log", &self.path))
    }

    /// Complete a request sample with probe counters and append it.
    ///
    /// # Errors
    ///
    /// Propagates [`TraceStore::append`] failures.
    pub fn record(&self, sample: RequestSample, probe: &dyn UsageProbe) -> Result<EventRecord, StoreError> {
        let record = sample.into_record(probe);
        self.append(&record)?;
        Ok(record)
    }

    /// [`TraceStore::record`] for the request path: failures are logged, not returned.
    pub fn record_best_effort(&self, sample: RequestSample, probe: &dyn UsageProbe) {
        let session = sample.session.clone();
        if let Err(e) = self.record(sample, probe) {
            warn!(error = %e, %session, "trace record dropped");
        }
    }

    /// Read records whose start time lies in `[from, to]`, in file order.
    ///
    /// Scanning stops at the first record starting after `to`, or once
    /// `limit` records are collected and another in-window record is seen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for read failures other than a missing file.
    pub fn query(&self, from: f64, to: f64, limit: usize) -> Result<QueryResult, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(QueryResult::default()),
            Err(e) => return Err(io_err("open log", &self.path)(e)),
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut result = QueryResult::default();
        let mut skipped = 0usize;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(io_err("read log", &self.path))?;
            if read == 0 {
                break;
            }
            // EDGE: an unterminated last line is a write still in progress.
            if line.last() != Some(&b'\n') {
                skipped += 1;
                break;
            }

            let Some(record) = self.decode(&line) else {
                skipped += 1;
                continue;
            };
            if record.start_time < from {
                continue;
            }
            if record.start_time > to {
                break;
            }
            if result.records.len() >= limit {
                result.truncated = true;
                break;
            }
            result.records.push(record);
        }

        debug!(
            returned = result.records.len(),
            skipped,
            truncated = result.truncated,
            "trace query finished"
        );
        Ok(result)
    }

    /// Trim the log to its newest ~90% of `max_size` once it reaches `max_size`.
    ///
    /// The tail is copied to a sibling temp file starting after the first
    /// newline (dropping the partial line at the cut), then swapped in place of
    /// the log. The rename is retried once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for copy failures and [`StoreError::Replace`]
    /// when the rotated file cannot be moved into place.
    pub fn rotate(&self, max_size: u64) -> Result<RotateOutcome, StoreError> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RotateOutcome::Skipped { size: 0 }),
            Err(e) => return Err(io_err("stat log", &self.path)(e)),
        };
        if size < max_size {
            return Ok(RotateOutcome::Skipped { size });
        }

        let keep = trim_target(max_size);
        let temp = self.rotation_path();
        let after = self.copy_tail(size.saturating_sub(keep), &temp)?;
        self.replace_with(&temp)?;

        info!(path = %self.path.display(), before = size, after, max_size, "trace log rotated");
        Ok(RotateOutcome::Rotated { before: size, after })
    }

    /// Path, existence and size of the log file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the file exists but cannot be inspected.
    pub fn status(&self) -> Result<StoreStatus, StoreError> {
        let (exists, size_bytes) = match fs::metadata(&self.path) {
            Ok(meta) => (true, meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => (false, 0),
            Err(e) => return Err(io_err("stat log", &self.path)(e)),
        };
        Ok(StoreStatus { path: self.path.clone(), exists, size_bytes })
    }

    fn decode(&self, raw: &[u8]) -> Option<EventRecord> {
        let token = std::str::from_utf8(raw).ok()?.trim();
        if token.is_empty() {
            return None;
        }
        let plaintext = self.keystream.decode_line(token).ok()?;
        parse_record(&plaintext).ok()
    }

    fn rotation_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".");
        name.push(ROTATE_SUFFIX);
        self.path.with_file_name(name)
    }

    // Copy from `offset` to EOF into `temp`, skipping through the first newline.
    fn copy_tail(&self, offset: u64, temp: &Path) -> Result<u64, StoreError> {
        let mut input = File::open(&self.path).map_err(io_err("open log", &self.path))?;
        input
            .seek(SeekFrom::Start(offset))
            .map_err(io_err("seek log", &self.path))?;
        let mut output = File::create(temp).map_err(io_err("create rotation file", temp))?;

        let mut buffer = vec![0u8; COPY_CHUNK_BYTES];
        let mut at_line_start = false;
        let mut copied = 0u64;

        loop {
            let read = input.read(&mut buffer).map_err(io_err("read log", &self.path))?;
            if read == 0 {
                break;
            }
            let mut chunk = &buffer[..read];
            if !at_line_start {
                // EDGE: the cut may land mid-line, and the line may span chunks.
                let Some(newline) = chunk.iter().position(|&b| b == b'\n') else {
                    continue;
                };
                chunk = &chunk[newline + 1..];
                at_line_start = true;
            }
            output.write_all(chunk).map_err(io_err("write rotation file", temp))?;
            copied += chunk.len() as u64;
        }

        output.flush().map_err(io_err("flush rotation file", temp))?;
        Ok(copied)
    }

    fn replace_with(&self, temp: &Path) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err("remove log", &self.path)(e)),
        }

        if let Err(first) = fs::rename(temp, &self.path) {
            // Some filesystems refuse to reuse a just-freed name on the first try.
            warn!(error = %first, path = %self.path.display(), "rename after rotation failed; retrying");
            let _ = fs::remove_file(&self.path);
            fs::rename(temp, &self.path)
                .map_err(|source| StoreError::Replace { path: self.path.clone(), source })?;
        }
        Ok(())
    }
}

/// Bytes kept by a rotation: 90% of the configured maximum.
#[must_use]
pub fn trim_target(max_size: u64) -> u64 {
    u64::try_from(u128::from(max_size) * 9 / 10).unwrap_or(u64::MAX)
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
