//! Deduplicating aggregator
//!
//! [`RecordStore`] owns every usage record seen so far, keyed by record identity, plus a
//! per-file read position so each scan only parses bytes appended since the last one.
//!
//! ## Re-read rules
//!
//! - Same size and modification time: the file is not opened.
//! - Grown: read from the saved offset.
//! - Shrunk, or same size with a new modification time: the file was rewritten. Its
//!   identities are released and it is read again from byte 0.
//!
//! Only newline-terminated lines are consumed, so a line still being written is picked
//! up whole on a later scan.
//!
//! ## Ownership
//!
//! An identity can appear in several files (resumed sessions copy earlier turns). Each
//! record keeps a count of files that contain it and is dropped only when that count
//! reaches zero, so invalidating one file never removes a record another file still
//! holds. Files that disappear keep their records: usage history is append-only.
//!
//! Reads are fanned out over rayon when the `parallel` feature is on; results are
//! merged sequentially in path order so the outcome does not depend on scheduling.

use crate::file_discovery::{Discovery, LogFile};
use crate::models::{ScanHealth, UsageRecord};
use crate::parser::{RecordParser, TailRead};
use chrono::{DateTime, Utc};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct FileState {
    /// Byte offset just past the last consumed newline.
    offset: u64,
    size_seen: u64,
    modified: Option<SystemTime>,
    identities: HashSet<String>,
    skipped_lines: u64,
}

#[derive(Debug)]
struct StoredRecord {
    record: UsageRecord,
    owners: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Append,
    Reset,
}

struct ReadJob<'a> {
    file: &'a LogFile,
    offset: u64,
    mode: ReadMode,
}

/// What one scan did, on top of the resulting health counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub files_read: usize,
    pub files_unchanged: usize,
    pub files_reset: usize,
    pub records_added: usize,
    pub records_removed: usize,
    pub health: ScanHealth,
}

#[derive(Debug, Default)]
pub struct RecordStore {
    parser: RecordParser,
    records: HashMap<String, StoredRecord>,
    files: HashMap<PathBuf, FileState>,
    parallel: bool,
}

impl RecordStore {
    pub fn new(parallel: bool) -> Self {
        Self {
            parallel,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &UsageRecord> {
        self.records.values().map(|stored| &stored.record)
    }

    pub fn earliest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records().map(|r| r.timestamp).min()
    }

    /// Lines handed to the parser over the store's lifetime.
    pub fn lines_parsed(&self) -> u64 {
        self.parser.lines_parsed()
    }

    /// Bring the store up to date with `discovery`.
    pub fn scan(&mut self, discovery: &Discovery) -> ScanReport {
        let mut report = ScanReport::default();
        let jobs = self.plan(discovery, &mut report);
        let results = self.read_all(&jobs);

        let mut unreadable = 0;
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(tail) => {
                    report.files_read += 1;
                    self.apply(job, tail, &mut report);
                }
                Err(e) => {
                    unreadable += 1;
                    warn!(path = %job.file.path.display(), error = %e, "Failed to read log file, keeping previous state");
                }
            }
        }

        report.health = ScanHealth {
            files_scanned: discovery.files.len(),
            skipped_lines: self.files.values().map(|s| s.skipped_lines).sum(),
            unreadable_files: unreadable,
            locator_issues: discovery.issues.len(),
        };

        debug!(
            files_read = report.files_read,
            files_unchanged = report.files_unchanged,
            files_reset = report.files_reset,
            records_added = report.records_added,
            records_removed = report.records_removed,
            total_records = self.records.len(),
            "Scan complete"
        );
        report
    }

    fn plan<'a>(&self, discovery: &'a Discovery, report: &mut ScanReport) -> Vec<ReadJob<'a>> {
        let mut jobs = Vec::new();
        for file in &discovery.files {
            let job = match self.files.get(&file.path) {
                None => ReadJob {
                    file,
                    offset: 0,
                    mode: ReadMode::Append,
                },
                Some(state) if file.size == state.size_seen && file.modified == state.modified => {
                    report.files_unchanged += 1;
                    continue;
                }
                Some(state) if file.size <= state.size_seen || file.size < state.offset => ReadJob {
                    file,
                    offset: 0,
                    mode: ReadMode::Reset,
                },
                Some(state) => ReadJob {
                    file,
                    offset: state.offset,
                    mode: ReadMode::Append,
                },
            };
            jobs.push(job);
        }
        jobs
    }

    fn read_all(&self, jobs: &[ReadJob<'_>]) -> Vec<io::Result<TailRead>> {
        #[cfg(feature = "parallel")]
        {
            if self.parallel && jobs.len() > 1 {
                return jobs
                    .par_iter()
                    .map(|job| self.parser.read_tail(job.file, job.offset))
                    .collect();
            }
        }

        jobs.iter()
            .map(|job| self.parser.read_tail(job.file, job.offset))
            .collect()
    }

    fn apply(&mut self, job: &ReadJob<'_>, tail: TailRead, report: &mut ScanReport) {
        if job.mode == ReadMode::Reset {
            report.files_reset += 1;
            report.records_removed += self.release_file(&job.file.path);
        }

        let state = self.files.entry(job.file.path.clone()).or_default();
        for record in tail.records {
            if !state.identities.insert(record.identity.clone()) {
                continue;
            }
            match self.records.get_mut(&record.identity) {
                Some(stored) => stored.owners += 1,
                None => {
                    report.records_added += 1;
                    self.records
                        .insert(record.identity.clone(), StoredRecord { record, owners: 1 });
                }
            }
        }

        state.skipped_lines += tail.skipped_lines;
        state.offset = tail.end_offset;
        state.size_seen = job.file.size;
        state.modified = job.file.modified;
    }

    /// Drop the file's claim on its identities. Returns how many records disappeared.
    fn release_file(&mut self, path: &Path) -> usize {
        let Some(state) = self.files.remove(path) else {
            return 0;
        };

        let mut removed = 0;
        for identity in state.identities {
            if let Some(stored) = self.records.get_mut(&identity) {
                stored.owners -= 1;
                if stored.owners == 0 {
                    self.records.remove(&identity);
                    removed += 1;
                }
            }
        }
        debug!(path = %path.display(), removed, "Released records of rewritten file");
        removed
    }
}
