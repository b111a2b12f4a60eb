//! Record parser
//!
//! Turns one physical JSONL line into a [`UsageRecord`], and reads the unread tail of a
//! log file line by line. Parsing never fails hard: malformed lines come back as
//! [`ParseOutcome::Skip`] and the caller keeps going.

use crate::file_discovery::LogFile;
use crate::models::{RawEntry, RawTimestamp, TokenCounts, UsageRecord, UNKNOWN_MODEL};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a line came from. Needed for fallback identities and record ownership.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub path: &'a Path,
    /// Byte offset of the first byte of the line.
    pub offset: u64,
    pub project_id: &'a str,
    pub session_fallback: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Record(UsageRecord),
    Skip(SkipReason),
    /// Valid JSON without a usage block (user turns, summaries).
    NotUsage,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    MissingTimestamp,
    BadTimestamp,
}

/// Result of reading a file from an offset up to its last complete line.
#[derive(Debug, Default)]
pub struct TailRead {
    pub records: Vec<UsageRecord>,
    pub skipped_lines: u64,
    /// Offset just past the last newline consumed.
    pub end_offset: u64,
}

#[derive(Debug, Default)]
pub struct RecordParser {
    lines_parsed: AtomicU64,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-blank lines handed to the decoder so far.
    pub fn lines_parsed(&self) -> u64 {
        self.lines_parsed.load(Ordering::Relaxed)
    }

    pub fn parse_line(&self, line: &str, ctx: &LineContext<'_>) -> ParseOutcome {
        let line = line.trim();
        if line.is_empty() {
            return ParseOutcome::Blank;
        }
        self.lines_parsed.fetch_add(1, Ordering::Relaxed);

        let raw: RawEntry = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(_) => return ParseOutcome::Skip(SkipReason::Malformed),
        };

        let Some(usage) = raw.usage() else {
            return ParseOutcome::NotUsage;
        };

        let timestamp = match &raw.timestamp {
            None => return ParseOutcome::Skip(SkipReason::MissingTimestamp),
            Some(ts) => match parse_timestamp(ts) {
                Some(ts) => ts,
                None => return ParseOutcome::Skip(SkipReason::BadTimestamp),
            },
        };

        // A response keeps its message id wherever it is logged; the request id is not
        // always written alongside it.
        let identity = match raw.message_id() {
            Some(id) => format!("msg:{}", id),
            None => format!("{}@{}", ctx.path.display(), ctx.offset),
        };

        let session_id = raw
            .session_id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ctx.session_fallback.to_string());

        ParseOutcome::Record(UsageRecord {
            identity,
            timestamp,
            project_id: ctx.project_id.to_string(),
            session_id,
            model: raw.model().unwrap_or(UNKNOWN_MODEL).to_string(),
            tokens: TokenCounts::from(usage),
            reported_cost_usd: raw.cost_usd,
        })
    }

    /// Parse every complete line of `file` starting at byte `offset`.
    ///
    /// A trailing line without a newline is left unread; the writer may still be
    /// appending to it.
    pub fn read_tail(&self, file: &LogFile, offset: u64) -> io::Result<TailRead> {
        let mut handle = File::open(&file.path)?;
        handle.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(handle);

        let mut tail = TailRead {
            end_offset: offset,
            ..Default::default()
        };
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }

            let ctx = LineContext {
                path: &file.path,
                offset: tail.end_offset,
                project_id: &file.project_id,
                session_fallback: &file.session_fallback,
            };
            tail.end_offset += read as u64;

            let line = String::from_utf8_lossy(&buf);
            match self.parse_line(&line, &ctx) {
                ParseOutcome::Record(record) => tail.records.push(record),
                ParseOutcome::Skip(_) => tail.skipped_lines += 1,
                ParseOutcome::NotUsage | ParseOutcome::Blank => {}
            }
        }

        Ok(tail)
    }
}

/// RFC 3339 first, then naive ISO forms assumed to be UTC, then epoch milliseconds.
pub fn parse_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms),
        RawTimestamp::Text(text) => {
            let text = text.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|naive| naive.and_utc())
        }
    }
}
