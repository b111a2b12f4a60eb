//! Shared fixtures: a throwaway Claude home with `projects/` and `vms/` trees.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ClaudeHome {
    dir: TempDir,
}

impl ClaudeHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `projects/<project>/<session>.jsonl`, creating the project directory.
    pub fn log_path(&self, project: &str, session: &str) -> PathBuf {
        let dir = self.root().join("projects").join(project);
        fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{}.jsonl", session))
    }

    pub fn vm_log_path(&self, vm: &str, project: &str, session: &str) -> PathBuf {
        let dir = self.root().join("vms").join(vm).join("projects").join(project);
        fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{}.jsonl", session))
    }

    pub fn write(&self, path: &Path, lines: &[String]) {
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(path, content).unwrap();
    }

    pub fn append(&self, path: &Path, content: &str) {
        let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
    }
}

/// Monday 2025-01-06 12:00:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap()
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

/// A Claude Code assistant line with a message id and request id.
pub fn usage_line(
    message_id: &str,
    request_id: &str,
    timestamp: DateTime<Utc>,
    model: &str,
    input: u64,
    output: u64,
) -> String {
    format!(
        r#"{{"type":"assistant","timestamp":"{}","sessionId":"s1","requestId":"{}","message":{{"id":"{}","model":"{}","usage":{{"input_tokens":{},"output_tokens":{},"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}}}}"#,
        timestamp.to_rfc3339(),
        request_id,
        message_id,
        model,
        input,
        output
    )
}

/// A usage line with no message id; its identity is its file position.
pub fn anonymous_line(timestamp: DateTime<Utc>, model: &str, input: u64, output: u64) -> String {
    format!(
        r#"{{"timestamp":"{}","message":{{"model":"{}","usage":{{"input_tokens":{},"output_tokens":{}}}}}}}"#,
        timestamp.to_rfc3339(),
        model,
        input,
        output
    )
}

/// A user turn: valid JSON without a usage block.
pub fn user_line(timestamp: DateTime<Utc>) -> String {
    format!(
        r#"{{"type":"user","timestamp":"{}","message":{{"role":"user","content":"hi"}}}}"#,
        timestamp.to_rfc3339()
    )
}
