//! Seed contexts handed to each debate.

use crate::core::DebateKind;
use crate::state::{RunState, TradePlan};
use serde_json::{json, Map, Value};

/// Builds the research debate seed from the analyst reports.
///
/// Reports are keyed by their report key; stages that failed are listed
/// under `missing` so debaters know what they are arguing without.
#[must_use]
pub fn research_seed(state: &RunState) -> Value {
    let mut reports = Map::new();
    let mut missing = Vec::new();

    for stage in state.config().active_stages() {
        match state.stage_result(*stage).filter(|r| r.is_success()) {
            Some(result) => {
                reports.insert(stage.report_key().to_string(), result.report.clone());
            }
            None => missing.push(stage.as_str()),
        }
    }

    json!({
        "ticker": state.ticker(),
        "trade_date": state.trade_date().to_string(),
        "reports": reports,
        "missing": missing,
    })
}

/// Builds the risk debate seed from the trader's plan and the research judgment.
#[must_use]
pub fn risk_seed(state: &RunState) -> Value {
    let plan = state.trader_plan();
    let research_judgment = state
        .debate(DebateKind::Research)
        .and_then(|d| d.judgment.as_ref())
        .map(|j| j.payload.clone());

    json!({
        "ticker": state.ticker(),
        "trade_date": state.trade_date().to_string(),
        "trader_plan": plan.and_then(TradePlan::drafted_payload),
        "plan_error": plan.and_then(|p| p.error.as_ref()).map(|e| e.message.clone()),
        "research_judgment": research_judgment,
    })
}
