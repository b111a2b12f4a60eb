//! End-to-end tests of the query facade against a temporary Claude home

mod common;

use chrono::{Duration, Utc};
use claude_usage_dash::engine::{EngineConfig, UsageEngine};
use claude_usage_dash::error::EngineError;
use claude_usage_dash::window::WindowSpec;
use common::{anonymous_line, at, t0, usage_line, user_line, ClaudeHome};
use std::sync::Arc;

fn engine_for(home: &ClaudeHome) -> UsageEngine {
    UsageEngine::new(EngineConfig::new(home.root()))
}

fn two_minutes() -> WindowSpec {
    WindowSpec::custom(t0(), at(120)).unwrap()
}

#[test]
fn test_three_requests_in_window() {
    let home = ClaudeHome::new();
    let path = home.log_path("-home-me-demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(0), "claude-opus-4-20250514", 100, 50),
            usage_line("msg_2", "req_2", at(30), "claude-opus-4-20250514", 100, 50),
            usage_line("msg_3", "req_3", at(60), "claude-opus-4-20250514", 100, 50),
        ],
    );

    let mut engine = engine_for(&home);
    let snapshot = engine.query_at(two_minutes(), at(61)).unwrap();

    assert_eq!(snapshot.total_tokens, 450);
    assert_eq!(snapshot.tokens.input_tokens, 300);
    assert_eq!(snapshot.tokens.output_tokens, 150);
    assert_eq!(snapshot.record_count, 3);
    assert!((snapshot.total_cost_usd - 0.01575).abs() < 1e-9);
    assert_eq!(snapshot.rate_60s, 5.0);
    assert_eq!(snapshot.rate_session_avg, 450.0 / 120.0);
    assert_eq!(snapshot.per_model.len(), 1);
    assert_eq!(snapshot.per_model[0].model, "claude-opus-4-20250514");
    assert!(snapshot.health.is_clean());
}

#[test]
fn test_first_minute_excludes_later_model() {
    let home = ClaudeHome::new();
    let path = home.log_path("-home-me-demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(0), "claude-opus-4-20250514", 100, 50),
            usage_line("msg_2", "req_2", at(30), "claude-opus-4-20250514", 200, 100),
            usage_line("msg_3", "req_3", at(90), "claude-3-5-haiku-20241022", 10, 5),
        ],
    );

    let mut engine = engine_for(&home);
    let window = WindowSpec::custom(t0(), at(60)).unwrap();
    let snapshot = engine.query_at(window, at(120)).unwrap();

    assert_eq!(snapshot.per_model.len(), 1);
    assert_eq!(snapshot.per_model[0].model, "claude-opus-4-20250514");
    assert_eq!(snapshot.per_model[0].total_tokens, 450);
    assert!((snapshot.total_cost_usd - 0.01575).abs() < 1e-9);
    assert_eq!(engine.record_count(), 3);
}

#[test]
fn test_duplicate_response_counted_once_across_files() {
    let home = ClaudeHome::new();
    let original = home.log_path("-home-me-demo", "session-a");
    let resumed = home.log_path("-home-me-demo", "session-b");
    let line = usage_line("msg_1", "req_1", at(10), "claude-sonnet-4-20250514", 1000, 100);
    home.write(&original, &[line.clone()]);
    home.write(
        &resumed,
        &[
            line,
            usage_line("msg_2", "req_2", at(20), "claude-sonnet-4-20250514", 10, 10),
        ],
    );

    let mut engine = engine_for(&home);
    let snapshot = engine.query_at(two_minutes(), at(30)).unwrap();

    assert_eq!(snapshot.record_count, 2);
    assert_eq!(snapshot.total_tokens, 1120);
    assert_eq!(engine.record_count(), 2);
}

#[test]
fn test_unchanged_logs_serve_cached_snapshot() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(&path, &[usage_line("msg_1", "req_1", at(0), "sonnet", 10, 10)]);

    let mut engine = engine_for(&home);
    let first = engine.query_at(two_minutes(), at(5)).unwrap();
    let parsed = engine.lines_parsed();

    let second = engine.query_at(two_minutes(), at(6)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.lines_parsed(), parsed);
    assert_eq!(engine.cache_stats().hits, 1);
    assert_eq!(engine.cache_stats().misses, 1);
    assert_eq!(engine.last_scan().files_unchanged, 1);
}

#[test]
fn test_appended_lines_are_read_incrementally() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(0), "sonnet", 10, 10),
            usage_line("msg_2", "req_2", at(1), "sonnet", 10, 10),
        ],
    );

    let mut engine = engine_for(&home);
    let before = engine.query_at(two_minutes(), at(5)).unwrap();
    assert_eq!(before.total_tokens, 40);
    let parsed = engine.lines_parsed();

    home.append(
        &path,
        &format!("{}\n", usage_line("msg_3", "req_3", at(2), "sonnet", 5, 5)),
    );
    let after = engine.query_at(two_minutes(), at(6)).unwrap();

    assert_eq!(after.total_tokens, 50);
    assert_eq!(after.record_count, 3);
    assert_eq!(engine.lines_parsed(), parsed + 1);
}

#[test]
fn test_partial_trailing_line_waits_for_newline() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(&path, &[usage_line("msg_1", "req_1", at(0), "sonnet", 10, 10)]);

    let line = usage_line("msg_2", "req_2", at(1), "sonnet", 7, 3);
    let (head, rest) = line.split_at(line.len() / 2);

    let mut engine = engine_for(&home);
    home.append(&path, head);
    let partial = engine.query_at(two_minutes(), at(5)).unwrap();
    assert_eq!(partial.record_count, 1);
    assert_eq!(partial.health.skipped_lines, 0);

    home.append(&path, &format!("{}\n", rest));
    let complete = engine.query_at(two_minutes(), at(6)).unwrap();
    assert_eq!(complete.record_count, 2);
    assert_eq!(complete.total_tokens, 30);
}

#[test]
fn test_rewritten_file_replaces_its_records() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(0), "sonnet", 100, 100),
            usage_line("msg_2", "req_2", at(1), "sonnet", 100, 100),
            anonymous_line(at(2), "sonnet", 100, 100),
        ],
    );

    let mut engine = engine_for(&home);
    assert_eq!(engine.query_at(two_minutes(), at(5)).unwrap().total_tokens, 600);

    home.write(&path, &[usage_line("msg_9", "req_9", at(3), "sonnet", 1, 1)]);
    let rewritten = engine.query_at(two_minutes(), at(6)).unwrap();

    assert_eq!(rewritten.total_tokens, 2);
    assert_eq!(rewritten.record_count, 1);
    assert_eq!(engine.record_count(), 1);
    assert_eq!(engine.last_scan().files_reset, 1);
}

#[test]
fn test_bad_lines_are_counted_not_fatal() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(
        &path,
        &[
            "{broken json line".to_string(),
            r#"{"message":{"model":"sonnet","usage":{"input_tokens":5}}}"#.to_string(),
            r#"{"timestamp":"yesterday","message":{"model":"sonnet","usage":{"input_tokens":5}}}"#
                .to_string(),
            user_line(at(0)),
            String::new(),
            usage_line("msg_1", "req_1", at(1), "sonnet", 10, 10),
        ],
    );

    let mut engine = engine_for(&home);
    let snapshot = engine.query_at(two_minutes(), at(5)).unwrap();

    assert_eq!(snapshot.record_count, 1);
    assert_eq!(snapshot.health.skipped_lines, 3);
    assert_eq!(snapshot.health.unreadable_files, 0);
    assert_eq!(snapshot.health.files_scanned, 1);
}

#[test]
fn test_vm_logs_follow_include_flag() {
    let home = ClaudeHome::new();
    let local = home.log_path("demo", "session-a");
    let vm = home.vm_log_path("devbox", "demo", "session-b");
    home.write(&local, &[usage_line("msg_1", "req_1", at(0), "sonnet", 10, 0)]);
    home.write(&vm, &[usage_line("msg_2", "req_2", at(0), "sonnet", 20, 0)]);

    let mut with_vms = engine_for(&home);
    assert_eq!(with_vms.query_at(two_minutes(), at(5)).unwrap().total_tokens, 30);

    let mut config = EngineConfig::new(home.root());
    config.include_vms = false;
    let mut without_vms = UsageEngine::new(config);
    assert_eq!(without_vms.query_at(two_minutes(), at(5)).unwrap().total_tokens, 10);
}

#[test]
fn test_all_time_starts_at_earliest_record() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(-3600), "haiku", 10, 0),
            usage_line("msg_2", "req_2", at(0), "opus", 10, 0),
        ],
    );

    let mut engine = engine_for(&home);
    let snapshot = engine.query_in(&Utc, WindowSpec::AllTime, at(60)).unwrap();

    assert_eq!(snapshot.window_start, at(-3600));
    assert_eq!(snapshot.window_end, at(60));
    assert_eq!(snapshot.record_count, 2);
    assert_eq!(snapshot.per_model.len(), 2);
}

#[test]
fn test_record_on_window_end_is_excluded() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(
        &path,
        &[
            usage_line("msg_1", "req_1", at(0), "sonnet", 1, 0),
            usage_line("msg_2", "req_2", at(120), "sonnet", 1, 0),
        ],
    );

    let mut engine = engine_for(&home);
    let snapshot = engine.query_at(two_minutes(), at(200)).unwrap();
    assert_eq!(snapshot.record_count, 1);
}

#[test]
fn test_invalid_window_is_the_only_error() {
    let home = ClaudeHome::new();
    let mut engine = UsageEngine::new(EngineConfig::new(home.root().join("nothing-here")));

    let inverted = WindowSpec::Custom {
        start: at(10),
        end: at(0),
    };
    assert!(matches!(
        engine.query_at(inverted, at(20)),
        Err(EngineError::InvalidWindow { .. })
    ));

    let empty = engine.query_at(two_minutes(), at(20)).unwrap();
    assert_eq!(empty.total_tokens, 0);
    assert!(empty.health.is_clean());
}

#[test]
fn test_persisted_cache_survives_restart() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(&path, &[usage_line("msg_1", "req_1", at(0), "sonnet", 10, 10)]);
    let cache_file = home.root().join("cache").join("snapshots.json");

    let mut config = EngineConfig::new(home.root());
    config.cache_file = Some(cache_file.clone());
    config.cache_max_age = None;

    let first = UsageEngine::new(config.clone())
        .query_at(two_minutes(), at(5))
        .unwrap();
    assert!(cache_file.is_file());

    let mut restarted = UsageEngine::new(config.clone());
    let second = restarted.query_at(two_minutes(), at(5)).unwrap();
    assert_eq!(restarted.cache_stats().hits, 1);
    assert_eq!(*first, *second);

    home.append(
        &path,
        &format!("{}\n", usage_line("msg_2", "req_2", at(1), "sonnet", 1, 1)),
    );
    let mut after_change = UsageEngine::new(config);
    let third = after_change.query_at(two_minutes(), at(5)).unwrap();
    assert_eq!(after_change.cache_stats().hits, 0);
    assert_eq!(third.total_tokens, 22);
}

#[test]
fn test_trailing_preset_slides_without_cache_expiry() {
    let home = ClaudeHome::new();
    let path = home.log_path("demo", "session-a");
    home.write(&path, &[usage_line("msg_1", "req_1", at(0), "sonnet", 10, 10)]);

    let mut config = EngineConfig::new(home.root());
    config.cache_max_age = None;
    let mut engine = UsageEngine::new(config);

    let first_now = t0() + Duration::hours(23) + Duration::minutes(59);
    let first = engine.query_in(&Utc, WindowSpec::Trailing24h, first_now).unwrap();
    assert_eq!(first.total_tokens, 20);

    let again = engine
        .query_in(&Utc, WindowSpec::Trailing24h, first_now + Duration::seconds(1))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let later_now = t0() + Duration::hours(25) + Duration::minutes(59);
    let later = engine.query_in(&Utc, WindowSpec::Trailing24h, later_now).unwrap();
    assert_eq!(later.total_tokens, 0);
    assert_eq!(later.window_start, later_now - Duration::hours(24));
    assert_eq!(engine.cache_stats().hits, 1);
}
