//! One wide summary event per run.

use crate::state::RunState;
use std::collections::BTreeMap;

/// Event type of the run summary.
pub const RUN_SUMMARY_EVENT: &str = "run.wide";

/// Builds the summary payload of a run.
#[must_use]
pub fn run_summary(state: &RunState, duration_ms: f64) -> serde_json::Value {
    let status = if state.is_sealed() {
        "concluded"
    } else if state.failure().is_some() {
        "failed"
    } else {
        "in_progress"
    };

    let mut stage_counts: BTreeMap<String, u32> = BTreeMap::new();
    for result in state.stage_results() {
        *stage_counts.entry(result.status.to_string()).or_insert(0) += 1;
    }

    let debates: serde_json::Map<_, _> = crate::core::DebateKind::ALL
        .into_iter()
        .filter_map(|kind| {
            state.debate(kind).map(|d| {
                (
                    kind.as_str().to_string(),
                    serde_json::json!({
                        "turns": d.turns.len(),
                        "rounds_completed": d.rounds_completed,
                        "degraded": d.is_degraded(),
                    }),
                )
            })
        })
        .collect();

    serde_json::json!({
        "event": RUN_SUMMARY_EVENT,
        "run_id": state.run_id().to_string(),
        "ticker": state.ticker(),
        "trade_date": state.trade_date().to_string(),
        "status": status,
        "stage_counts": stage_counts,
        "debates": debates,
        "plan_degraded": state.trader_plan().map(|p| p.is_degraded()),
        "decision": state.final_verdict().map(|v| v.decision.to_string()),
        "degraded": state.is_degraded(),
        "steps": state.step_counter(),
        "duration_ms": duration_ms,
    })
}

/// Logs the run summary at info level.
pub fn emit_run_summary(state: &RunState, duration_ms: f64) {
    let payload = run_summary(state, duration_ms);
    tracing::info!(
        event = RUN_SUMMARY_EVENT,
        run_id = %state.run_id(),
        payload = %payload,
        "Run summary"
    );
}
