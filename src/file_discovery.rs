//! Log locator
//!
//! Enumerates the JSONL session logs under a Claude home directory:
//!
//! - `<root>/projects/<project>/<session>.jsonl`
//! - `<root>/vms/<vm>/projects/<project>/<session>.jsonl` when VM trees are enabled
//!
//! Nothing here is fatal. A missing root is an empty result, and unreadable entries are
//! reported as [`LocatorIssue`]s next to the files that were found.

use glob::{glob, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// A discovered log file with the metadata observed at discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub project_id: String,
    /// File stem, used as the session id for lines that carry none.
    pub session_fallback: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Identity of the source data set: changes whenever a file appears, disappears,
/// grows, shrinks or is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFingerprint(pub u64);

#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted by path.
    pub files: Vec<LogFile>,
    pub issues: Vec<LocatorIssue>,
}

impl Discovery {
    pub fn fingerprint(&self) -> SourceFingerprint {
        let mut hasher = DefaultHasher::new();
        self.files.len().hash(&mut hasher);
        for file in &self.files {
            file.path.hash(&mut hasher);
            file.size.hash(&mut hasher);
            file.modified
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .hash(&mut hasher);
        }
        SourceFingerprint(hasher.finish())
    }
}

#[derive(Debug, Clone)]
pub struct LogLocator {
    root: PathBuf,
    include_vms: bool,
}

impl LogLocator {
    pub fn new(root: impl Into<PathBuf>, include_vms: bool) -> Self {
        Self {
            root: root.into(),
            include_vms,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn discover(&self) -> Discovery {
        let mut discovery = Discovery::default();

        if !self.root.exists() {
            debug!(root = %self.root.display(), "Claude home does not exist, nothing to scan");
            return discovery;
        }
        if let Err(e) = fs::read_dir(&self.root) {
            warn!(root = %self.root.display(), error = %e, "Claude home is not readable");
            discovery.issues.push(LocatorIssue {
                path: self.root.clone(),
                message: e.to_string(),
            });
            return discovery;
        }

        let escaped_root = Pattern::escape(&self.root.to_string_lossy());
        let mut patterns = vec![format!("{}/projects/*/*.jsonl", escaped_root)];
        if self.include_vms {
            patterns.push(format!("{}/vms/*/projects/*/*.jsonl", escaped_root));
        }

        for pattern in &patterns {
            let entries = match glob(pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    discovery.issues.push(LocatorIssue {
                        path: self.root.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    Ok(path) => self.add_file(path, &mut discovery),
                    Err(e) => {
                        warn!(path = %e.path().display(), error = %e.error(), "Skipping unreadable log path");
                        discovery.issues.push(LocatorIssue {
                            path: e.path().to_path_buf(),
                            message: e.error().to_string(),
                        });
                    }
                }
            }
        }

        discovery.files.sort_by(|a, b| a.path.cmp(&b.path));
        discovery.files.dedup_by(|a, b| a.path == b.path);

        debug!(
            files = discovery.files.len(),
            issues = discovery.issues.len(),
            "Log discovery complete"
        );
        discovery
    }

    fn add_file(&self, path: PathBuf, discovery: &mut Discovery) {
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                discovery.issues.push(LocatorIssue {
                    path,
                    message: e.to_string(),
                });
                return;
            }
        };
        if !metadata.is_file() {
            return;
        }

        let project_id = self.project_id_for(&path);
        let session_fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        discovery.files.push(LogFile {
            path,
            project_id,
            session_fallback,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }

    /// `-home-me-code-app` becomes `home-me-code-app`; VM projects are prefixed with
    /// `vms/<vm>/`.
    fn project_id_for(&self, path: &Path) -> String {
        let project = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().trim_start_matches('-').to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let vm = path
            .strip_prefix(self.root.join("vms"))
            .ok()
            .and_then(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned());

        match vm {
            Some(vm) => format!("vms/{}/{}", vm, project),
            None => project,
        }
    }
}
