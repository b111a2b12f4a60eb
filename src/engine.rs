//! Query facade
//!
//! [`UsageEngine::query`] is the single entry point the dashboard uses. Each call:
//!
//! 1. validates the window (the only hard error),
//! 2. discovers log files and fingerprints their metadata,
//! 3. brings the record store up to date with whatever was appended,
//! 4. resolves the window against the current time,
//! 5. serves the cached snapshot when the fingerprint and age allow it,
//! 6. otherwise computes rates and builds a new snapshot, caching it only when every
//!    file that needed reading was read.
//!
//! Repeated calls with nothing new on disk return the same snapshot without opening a
//! single log file.

use crate::cache::{CacheStats, CacheStore};
use crate::config::Config;
use crate::dedup::{RecordStore, ScanReport};
use crate::error::Result;
use crate::file_discovery::{Discovery, LogLocator};
use crate::models::Snapshot;
use crate::pricing::CostModel;
use crate::rates::compute_rates;
use crate::snapshot::{build_snapshot, BuildContext};
use crate::window::{WindowSpec, DEFAULT_WEEK_START_HOUR};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Everything the engine needs, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Claude home directory, the parent of `projects/`.
    pub root: PathBuf,
    pub include_vms: bool,
    pub parallel: bool,
    pub cache_capacity: usize,
    /// `None` keeps cache entries until the logs change.
    pub cache_max_age: Option<Duration>,
    /// Where to persist the snapshot cache, if anywhere.
    pub cache_file: Option<PathBuf>,
    pub week_start_hour: u32,
    pub cost_model: CostModel,
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_vms: true,
            parallel: true,
            cache_capacity: 8,
            cache_max_age: Some(Duration::seconds(30)),
            cache_file: None,
            week_start_hour: DEFAULT_WEEK_START_HOUR,
            cost_model: CostModel::builtin(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        let mut cost_model = CostModel::builtin();
        cost_model.merge(
            config
                .pricing
                .overrides
                .iter()
                .map(|(name, rates)| (name.clone(), *rates)),
        );

        Self {
            root: config.paths.claude_home.clone(),
            include_vms: config.scan.include_vms,
            parallel: config.scan.parallel,
            cache_capacity: config.cache.capacity,
            cache_max_age: (config.cache.max_age_secs > 0)
                .then(|| Duration::seconds(config.cache.max_age_secs as i64)),
            cache_file: config
                .cache
                .persist
                .then(|| config.paths.cache_file.clone()),
            week_start_hour: config.window.week_start_hour,
            cost_model,
        }
    }
}

#[derive(Debug)]
pub struct UsageEngine {
    instance_id: Uuid,
    locator: LogLocator,
    store: RecordStore,
    cache: CacheStore,
    cost_model: CostModel,
    week_start_hour: u32,
    cache_file: Option<PathBuf>,
    last_scan: ScanReport,
}

impl UsageEngine {
    pub fn new(config: EngineConfig) -> Self {
        let instance_id = Uuid::new_v4();
        let locator = LogLocator::new(config.root, config.include_vms);

        let cache = match &config.cache_file {
            Some(path) => {
                let fingerprint = locator.discover().fingerprint();
                CacheStore::load(path, config.cache_capacity, config.cache_max_age, fingerprint)
            }
            None => CacheStore::new(config.cache_capacity, config.cache_max_age),
        };

        info!(
            instance_id = %instance_id,
            root = %locator.root().display(),
            cached = cache.len(),
            "Usage engine created"
        );

        Self {
            instance_id,
            locator,
            store: RecordStore::new(config.parallel),
            cache,
            cost_model: config.cost_model,
            week_start_hour: config.week_start_hour,
            cache_file: config.cache_file,
            last_scan: ScanReport::default(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Lines handed to the parser since the engine was created.
    pub fn lines_parsed(&self) -> u64 {
        self.store.lines_parsed()
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn last_scan(&self) -> &ScanReport {
        &self.last_scan
    }

    /// Snapshot for `spec` as of now, in the local time zone.
    pub fn query(&mut self, spec: WindowSpec) -> Result<Arc<Snapshot>> {
        self.query_in(&Local, spec, Utc::now())
    }

    /// Snapshot for `spec` as of `now`, in the local time zone.
    pub fn query_at(&mut self, spec: WindowSpec, now: DateTime<Utc>) -> Result<Arc<Snapshot>> {
        self.query_in(&Local, spec, now)
    }

    /// Snapshot for `spec` as of `now`, resolving calendar presets in `tz`.
    pub fn query_in<Tz: TimeZone>(
        &mut self,
        tz: &Tz,
        spec: WindowSpec,
        now: DateTime<Utc>,
    ) -> Result<Arc<Snapshot>> {
        let span = info_span!("query", instance_id = %self.instance_id, window = %spec);
        let _enter = span.enter();

        spec.validate()?;

        let discovery = self.locator.discover();
        self.query_discovered(&discovery, tz, spec, now)
    }

    fn query_discovered<Tz: TimeZone>(
        &mut self,
        discovery: &Discovery,
        tz: &Tz,
        spec: WindowSpec,
        now: DateTime<Utc>,
    ) -> Result<Arc<Snapshot>> {
        let fingerprint = discovery.fingerprint();
        self.last_scan = self.store.scan(discovery);

        let window = spec.resolve_in(tz, now, self.week_start_hour, self.store.earliest_timestamp())?;
        if let Some(snapshot) = self.cache.get(&spec, &window, fingerprint, now) {
            debug!("Serving cached snapshot");
            return Ok(snapshot);
        }

        let selected = window.select(self.store.records());
        let ctx = BuildContext {
            spec,
            window,
            rates: compute_rates(&selected, &window, now),
            cost_model: &self.cost_model,
            health: self.last_scan.health,
            now,
        };
        let snapshot = Arc::new(build_snapshot(&selected, &ctx));

        debug!(
            records = snapshot.record_count,
            total_tokens = snapshot.total_tokens,
            total_cost_usd = snapshot.total_cost_usd,
            "Built snapshot"
        );

        // The fingerprint cannot tell a failed read from a successful one.
        if self.last_scan.health.unreadable_files == 0 {
            self.cache.put(spec, fingerprint, Arc::clone(&snapshot), now);
            self.persist_cache();
        } else {
            debug!(
                unreadable_files = self.last_scan.health.unreadable_files,
                "Not caching snapshot built from a partial read"
            );
        }

        Ok(snapshot)
    }

    fn persist_cache(&self) {
        let Some(path) = &self.cache_file else {
            return;
        };
        if let Err(e) = self.cache.save(path) {
            warn!(path = %path.display(), error = %e, "Failed to persist snapshot cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::TimeZone;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn usage(id: &str, input: u64) -> String {
        format!(
            r#"{{"timestamp":"2025-01-06T12:00:00Z","requestId":"r-{id}","message":{{"id":"{id}","model":"claude-sonnet-4","usage":{{"input_tokens":{input},"output_tokens":0}}}}}}"#,
        ) + "\n"
    }

    #[test]
    fn test_invalid_window_rejected_before_scanning() {
        let temp = TempDir::new().unwrap();
        let mut engine = UsageEngine::new(EngineConfig::new(temp.path()));
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let result = engine.query(WindowSpec::Custom { start, end });
        assert!(matches!(result, Err(EngineError::InvalidWindow { .. })));
        assert_eq!(engine.cache_stats().misses, 0);
    }

    #[test]
    fn test_absent_root_gives_empty_snapshot() {
        let temp = TempDir::new().unwrap();
        let mut engine = UsageEngine::new(EngineConfig::new(temp.path().join("missing")));

        let snapshot = engine.query(WindowSpec::AllTime).unwrap();
        assert_eq!(snapshot.total_tokens, 0);
        assert!(snapshot.per_model.is_empty());
        assert_eq!(snapshot.rate_60s, 0.0);
        assert_eq!(snapshot.rate_session_avg, 0.0);
        assert!(snapshot.health.is_clean());
    }

    #[test]
    fn test_config_conversion() {
        let mut config = Config::default();
        config.cache.max_age_secs = 0;
        config.cache.persist = true;
        config.paths.claude_home = PathBuf::from("/tmp/claude-home");

        let engine_config = EngineConfig::from(&config);
        assert_eq!(engine_config.root, PathBuf::from("/tmp/claude-home"));
        assert!(engine_config.cache_max_age.is_none());
        assert_eq!(engine_config.cache_file, Some(config.paths.cache_file.clone()));
    }

    #[test]
    fn test_unreadable_file_keeps_records_and_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("projects").join("demo");
        fs::create_dir_all(&project).unwrap();
        let a = project.join("a.jsonl");
        fs::write(&a, usage("msg_a1", 10)).unwrap();
        fs::write(project.join("b.jsonl"), usage("msg_b1", 5)).unwrap();

        let mut config = EngineConfig::new(temp.path());
        config.cache_max_age = None;
        let mut engine = UsageEngine::new(config);
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 13, 0, 0).unwrap();
        let window = WindowSpec::custom(now - Duration::days(1), now).unwrap();
        assert_eq!(engine.query_in(&Utc, window, now).unwrap().total_tokens, 15);

        // a.jsonl grows, then disappears between discovery and the read
        let mut file = OpenOptions::new().append(true).open(&a).unwrap();
        file.write_all(usage("msg_a2", 100).as_bytes()).unwrap();
        drop(file);
        let discovery = engine.locator.discover();
        let aside = project.join("a.jsonl.aside");
        fs::rename(&a, &aside).unwrap();

        let partial = engine.query_discovered(&discovery, &Utc, window, now).unwrap();
        assert_eq!(partial.health.unreadable_files, 1);
        assert_eq!(partial.total_tokens, 15);
        assert_eq!(engine.record_count(), 2);

        // same size and mtime as in `discovery`, so the fingerprint is unchanged
        fs::rename(&aside, &a).unwrap();
        let recovered = engine.query_in(&Utc, window, now).unwrap();
        assert_eq!(recovered.total_tokens, 115);
        assert_eq!(recovered.health.unreadable_files, 0);
        assert_eq!(engine.cache_stats().hits, 0);
    }
}
