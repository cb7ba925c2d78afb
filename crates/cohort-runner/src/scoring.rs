//! Effective points, rankings and the recommendation.
//!
//! Effective points weight the share of ticks spent in each tier:
//! `boosted% × 1.0 + standard% × 0.5 + basic% × 0.1`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use cohort_core::{
    CohortComparison, MemberResult, MetricsSummary, ParameterSet, Rankings, Recommendation,
};
use rust_decimal::Decimal;

pub const BOOSTED_WEIGHT: Decimal = Decimal::ONE;
pub const STANDARD_WEIGHT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
pub const BASIC_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

pub fn effective_points(metrics: &MetricsSummary) -> Decimal {
    metrics.boosted_time_pct * BOOSTED_WEIGHT
        + metrics.standard_time_pct * STANDARD_WEIGHT
        + metrics.basic_time_pct * BASIC_WEIGHT
}

pub fn member_result(parameter_set: &ParameterSet, metrics: MetricsSummary) -> MemberResult {
    MemberResult {
        parameter_set_id: parameter_set.id.clone(),
        name: parameter_set.name.clone(),
        description: parameter_set.description.clone(),
        config: parameter_set.config.clone(),
        effective_points: effective_points(&metrics),
        metrics,
    }
}

/// Descending by `key`, ties broken by parameter-set id ascending.
fn rank_by<K: Ord>(members: &[MemberResult], key: impl Fn(&MemberResult) -> K) -> Vec<String> {
    let mut ranked: Vec<&MemberResult> = members.iter().collect();
    ranked.sort_by(|a, b| by_key_desc(a, b, &key));
    ranked.into_iter().map(|m| m.parameter_set_id.clone()).collect()
}

fn by_key_desc<K: Ord>(
    a: &MemberResult,
    b: &MemberResult,
    key: &impl Fn(&MemberResult) -> K,
) -> Ordering {
    key(b)
        .cmp(&key(a))
        .then_with(|| a.parameter_set_id.cmp(&b.parameter_set_id))
}

pub fn rankings(members: &[MemberResult]) -> Rankings {
    Rankings {
        by_effective_points: rank_by(members, |m| m.effective_points),
        by_pnl: rank_by(members, |m| m.metrics.simulated_pnl),
        by_uptime: rank_by(members, |m| m.metrics.uptime_pct),
        by_fills: rank_by(members, |m| m.metrics.fill_count),
    }
}

fn recommendation(best: &MemberResult, runner_up: Option<&MemberResult>) -> Recommendation {
    let m = &best.metrics;
    let mut reason = format!(
        "highest effective points {} (boosted {}%, standard {}%, basic {}%), uptime {}%, pnl {}, fills {}",
        best.effective_points.round_dp(2),
        m.boosted_time_pct.round_dp(2),
        m.standard_time_pct.round_dp(2),
        m.basic_time_pct.round_dp(2),
        m.uptime_pct.round_dp(2),
        m.simulated_pnl.round_dp(4),
        m.fill_count,
    );
    if let Some(next) = runner_up {
        reason.push_str(&format!(
            "; ahead of {} by {}",
            next.parameter_set_id,
            (best.effective_points - next.effective_points).round_dp(2)
        ));
    }

    Recommendation {
        parameter_set_id: best.parameter_set_id.clone(),
        name: best.name.clone(),
        effective_points: best.effective_points,
        reason,
    }
}

/// Sort members best-first and derive rankings and the recommendation.
pub fn build_comparison(
    run_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    mut members: Vec<MemberResult>,
) -> CohortComparison {
    members.sort_by(|a, b| by_key_desc(a, b, &|m: &MemberResult| m.effective_points));

    let duration_secs = match (started_at, ended_at) {
        (Some(start), Some(end)) => (end - start).num_seconds().max(0),
        _ => 0,
    };
    let rankings = rankings(&members);
    let recommendation = members
        .first()
        .map(|best| recommendation(best, members.get(1)));

    CohortComparison {
        run_id,
        started_at,
        ended_at,
        duration_secs,
        members,
        rankings,
        recommendation,
    }
}
