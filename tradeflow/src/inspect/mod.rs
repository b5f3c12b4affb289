//! Snapshot, serialization and diff utilities for run states.
//!
//! These work on any state, finished or not: a snapshot taken mid-stream,
//! the partial state of an aborted run, or a state loaded from disk.

mod diff;
mod persist;
mod summary;

pub use diff::{diff, Change, ChangeKind};
pub use persist::{load_state, results_path, save_state, STATE_FILE_NAME};
pub use summary::{summarize, FieldSummary, PREVIEW_CHARS};

use crate::errors::TradeflowError;
use crate::state::RunState;
use sha2::{Digest, Sha256};

/// Returns an independent deep copy of the state.
#[must_use]
pub fn snapshot(state: &RunState) -> RunState {
    state.clone()
}

/// Serializes the state to a pretty-printed JSON document.
pub fn serialize(state: &RunState) -> Result<Vec<u8>, TradeflowError> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Restores a state from [`serialize`] output.
pub fn deserialize(bytes: &[u8]) -> Result<RunState, TradeflowError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Returns the SHA-256 hex digest of the serialized state.
pub fn fingerprint(state: &RunState) -> Result<String, TradeflowError> {
    let bytes = serde_json::to_vec(state)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DebateKind, RoleId, StageId};
    use crate::state::StageResult;
    use crate::capabilities::FnTrader;
    use crate::testing::{test_config, test_config_builder, StaticAnalyst, TestPipeline};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn state() -> RunState {
        RunState::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            test_config(),
        )
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut state = state();
        state
            .insert_stage_result(StageResult::ok(StageId::News, serde_json::json!(["a", "b"])))
            .unwrap();
        state.open_debate(DebateKind::Research).unwrap();
        state
            .append_turn(DebateKind::Research, RoleId::Bull, 1, serde_json::json!("long"))
            .unwrap();

        let bytes = serialize(&state).unwrap();
        let back = deserialize(&bytes).unwrap();
        assert_eq!(back, state);
    }

    #[tokio::test]
    async fn test_null_reports_round_trip() {
        let pipeline = TestPipeline::new()
            .with_analyst(
                StageId::Market,
                Arc::new(StaticAnalyst::with_report(serde_json::Value::Null)),
            )
            .with_trader(Arc::new(FnTrader::new("trader", |_, _| {
                Ok(serde_json::Value::Null)
            })))
            .build()
            .unwrap();
        let config = test_config_builder()
            .active_stages([StageId::Market])
            .build()
            .unwrap();

        let state = pipeline.run(&config, "AAPL", "2024-01-15").await.unwrap();
        let market = state.stage_result(StageId::Market).unwrap();
        assert!(market.is_success());
        assert!(market.report.is_null());
        let plan = state.trader_plan().unwrap();
        assert!(!plan.is_degraded());
        assert!(plan.payload.is_null());

        let back = deserialize(&serialize(&state).unwrap()).unwrap();
        assert_eq!(back, state);
        assert!(back.trader_plan().unwrap().drafted_payload().is_some());
    }

    #[test]
    fn test_large_float_round_trips_exactly() {
        let mut state = state();
        state
            .insert_stage_result(StageResult::ok(
                StageId::Fundamentals,
                serde_json::json!({ "market_cap": 6.178_787_134_922_198e305 }),
            ))
            .unwrap();

        let back = deserialize(&serialize(&state).unwrap()).unwrap();
        assert_eq!(back, state);
        assert_eq!(
            back.stage_result(StageId::Fundamentals).unwrap().report["market_cap"].as_f64(),
            Some(6.178_787_134_922_198e305)
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let value: serde_json::Value = serde_json::from_slice(&serialize(&state()).unwrap()).unwrap();
        let mut fields: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        fields.sort();
        assert_eq!(
            fields,
            vec![
                "config",
                "failure",
                "final_verdict",
                "research_debate",
                "risk_debate",
                "run_id",
                "sealed",
                "stage_results",
                "step_counter",
                "ticker",
                "trade_date",
                "trader_plan",
            ]
        );
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            deserialize(b"not json"),
            Err(TradeflowError::Serialization(_))
        ));
    }

    #[test]
    fn test_snapshot_independent() {
        let original = state();
        let mut copy = snapshot(&original);
        copy.insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("m")))
            .unwrap();
        assert!(original.stage_results().is_empty());
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let state = state();
        let a = fingerprint(&state).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(&state.clone()).unwrap());

        let mut changed = state.clone();
        changed
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("m")))
            .unwrap();
        assert_ne!(a, fingerprint(&changed).unwrap());
    }
}
