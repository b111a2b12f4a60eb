//! Snapshot builder
//!
//! A pure function from already-filtered records to an immutable [`Snapshot`]. Costs are
//! applied per record so a reported cost on one line never leaks into another.

use crate::models::{ModelUsage, ScanHealth, Snapshot, TokenCounts, UsageRecord};
use crate::pricing::CostModel;
use crate::rates::Rates;
use crate::window::{ResolvedWindow, WindowSpec};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Everything a build needs besides the records themselves.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub spec: WindowSpec,
    pub window: ResolvedWindow,
    pub rates: Rates,
    pub cost_model: &'a CostModel,
    pub health: ScanHealth,
    pub now: DateTime<Utc>,
}

/// Records are summed in `(timestamp, identity)` order so the floating point totals do
/// not depend on the order the caller collected them in.
pub fn build_snapshot(records: &[&UsageRecord], ctx: &BuildContext<'_>) -> Snapshot {
    let mut ordered = records.to_vec();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.identity.cmp(&b.identity))
    });

    let mut tokens = TokenCounts::default();
    let mut total_cost = 0.0;
    let mut by_model: HashMap<&str, ModelUsage> = HashMap::new();

    for record in &ordered {
        let cost = ctx.cost_model.record_cost(record);
        tokens.add(&record.tokens);
        total_cost += cost;

        let entry = by_model
            .entry(record.model.as_str())
            .or_insert_with(|| ModelUsage {
                model: record.model.clone(),
                total_tokens: 0,
                total_cost_usd: 0.0,
                record_count: 0,
            });
        entry.total_tokens = entry.total_tokens.saturating_add(record.total_tokens());
        entry.total_cost_usd += cost;
        entry.record_count += 1;
    }

    let mut per_model: Vec<ModelUsage> = by_model.into_values().collect();
    per_model.sort_by(|a, b| {
        b.total_cost_usd
            .partial_cmp(&a.total_cost_usd)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.model.cmp(&b.model))
    });

    Snapshot {
        window: ctx.spec,
        window_start: ctx.window.start,
        window_end: ctx.window.end,
        tokens,
        total_tokens: tokens.total(),
        total_cost_usd: total_cost,
        record_count: records.len() as u64,
        per_model,
        rate_60s: ctx.rates.rate_60s,
        rate_session_avg: ctx.rates.rate_session_avg,
        built_at: ctx.now,
        health: ctx.health,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::compute_rates;
    use chrono::{Duration, TimeZone};

    fn record(id: &str, model: &str, ts: DateTime<Utc>, input: u64, output: u64) -> UsageRecord {
        UsageRecord {
            identity: id.to_string(),
            timestamp: ts,
            project_id: "p".into(),
            session_id: "s".into(),
            model: model.to_string(),
            tokens: TokenCounts {
                input_tokens: input,
                output_tokens: output,
                ..Default::default()
            },
            reported_cost_usd: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap()
    }

    fn build(records: &[UsageRecord], spec: WindowSpec, now: DateTime<Utc>, model: &CostModel) -> Snapshot {
        let window = spec.resolve_in(&Utc, now, 9, None).unwrap();
        let selected = window.select(records);
        let ctx = BuildContext {
            spec,
            window,
            rates: compute_rates(&selected, &window, now),
            cost_model: model,
            health: ScanHealth::default(),
            now,
        };
        build_snapshot(&selected, &ctx)
    }

    #[test]
    fn test_three_line_scenario() {
        let cost_model = CostModel::builtin();
        let records = vec![
            record("a", "opus", t0(), 100, 50),
            record("b", "opus", t0() + Duration::seconds(30), 200, 100),
            record("c", "haiku", t0() + Duration::seconds(90), 10, 5),
        ];
        let spec = WindowSpec::custom(t0(), t0() + Duration::seconds(60)).unwrap();
        let now = t0() + Duration::seconds(61);

        let snapshot = build(&records, spec, now, &cost_model);

        assert_eq!(snapshot.per_model.len(), 1);
        assert_eq!(snapshot.per_model[0].model, "opus");
        assert_eq!(snapshot.per_model[0].total_tokens, 450);
        assert_eq!(snapshot.per_model[0].record_count, 2);
        assert_eq!(snapshot.total_tokens, 450);

        let expected = cost_model.cost(
            "opus",
            &TokenCounts {
                input_tokens: 300,
                output_tokens: 150,
                ..Default::default()
            },
        );
        assert!((snapshot.total_cost_usd - expected).abs() < 1e-12);
        assert!((snapshot.total_cost_usd - 0.01575).abs() < 1e-12);
        // the record at T0+30s is the only one within 60s of now
        assert!((snapshot.rate_60s - 300.0 / 60.0).abs() < 1e-9);
        assert_eq!(snapshot.window_start, t0());
        assert_eq!(snapshot.window_end, t0() + Duration::seconds(60));
        assert_eq!(snapshot.built_at, now);
    }

    #[test]
    fn test_per_model_sorted_by_cost_then_name() {
        let cost_model = CostModel::builtin();
        let now = t0() + Duration::minutes(5);
        let records = vec![
            record("a", "claude-3-haiku", t0(), 1000, 0),
            record("b", "claude-opus-4", t0(), 1000, 0),
            record("c", "zeta", t0(), 0, 0),
            record("d", "alpha", t0(), 0, 0),
        ];
        let spec = WindowSpec::custom(t0(), now).unwrap();
        let snapshot = build(&records, spec, now, &cost_model);

        let order: Vec<_> = snapshot.per_model.iter().map(|m| m.model.as_str()).collect();
        assert_eq!(order, vec!["claude-opus-4", "claude-3-haiku", "alpha", "zeta"]);
    }

    #[test]
    fn test_empty_window() {
        let cost_model = CostModel::builtin();
        let spec = WindowSpec::custom(t0(), t0()).unwrap();
        let snapshot = build(&[record("a", "opus", t0(), 1, 1)], spec, t0(), &cost_model);

        assert!(snapshot.per_model.is_empty());
        assert_eq!(snapshot.total_tokens, 0);
        assert_eq!(snapshot.total_cost_usd, 0.0);
        assert_eq!(snapshot.rate_60s, 0.0);
        assert_eq!(snapshot.rate_session_avg, 0.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let cost_model = CostModel::builtin();
        let now = t0() + Duration::hours(1);
        let records: Vec<_> = (0..20)
            .map(|i| {
                let model = if i % 3 == 0 { "sonnet" } else { "haiku" };
                record(&i.to_string(), model, t0() + Duration::minutes(i), 10 * i as u64, 1)
            })
            .collect();
        let spec = WindowSpec::custom(t0(), now).unwrap();
        assert_eq!(
            build(&records, spec, now, &cost_model),
            build(&records, spec, now, &cost_model)
        );
    }

    #[test]
    fn test_reported_cost_is_used_per_record() {
        let cost_model = CostModel::builtin();
        let mut reported = record("a", "opus", t0(), 1000, 0);
        reported.reported_cost_usd = Some(1.0);
        let estimated = record("b", "opus", t0(), 1000, 0);
        let spec = WindowSpec::custom(t0(), t0() + Duration::seconds(1)).unwrap();

        let snapshot = build(&[reported, estimated.clone()], spec, t0(), &cost_model);
        let expected = 1.0 + cost_model.record_cost(&estimated);
        assert!((snapshot.total_cost_usd - expected).abs() < 1e-12);
    }
}
