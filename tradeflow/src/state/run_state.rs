//! The run state container.

use super::records::{
    DebateRecord, DebateTurn, FinalVerdict, Judgment, RunFailure, StageResult, TradePlan,
};
use crate::config::RunConfig;
use crate::core::{DebateKind, DebateStatus, RoleId, StageId};
use crate::errors::{EngineInvariantViolation, StateSealedError, TradeflowError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single mutable record threaded through one run.
///
/// Outside the crate a `RunState` is read-only: every mutation goes through
/// crate-private methods that bump `step_counter` and refuse to write once the
/// state is sealed. Cloning produces an independent deep copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    run_id: Uuid,
    ticker: String,
    trade_date: NaiveDate,
    config: RunConfig,
    stage_results: Vec<StageResult>,
    research_debate: Option<DebateRecord>,
    risk_debate: Option<DebateRecord>,
    trader_plan: Option<TradePlan>,
    final_verdict: Option<FinalVerdict>,
    step_counter: u64,
    sealed: bool,
    failure: Option<RunFailure>,
}

impl RunState {
    /// Creates the initial state for a run.
    #[must_use]
    pub fn new(ticker: impl Into<String>, trade_date: NaiveDate, config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ticker: ticker.into(),
            trade_date,
            config,
            stage_results: Vec::new(),
            research_debate: None,
            risk_debate: None,
            trader_plan: None,
            final_verdict: None,
            step_counter: 0,
            sealed: false,
            failure: None,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the ticker symbol.
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Returns the trade date.
    #[must_use]
    pub fn trade_date(&self) -> NaiveDate {
        self.trade_date
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns stage results in completion order.
    #[must_use]
    pub fn stage_results(&self) -> &[StageResult] {
        &self.stage_results
    }

    /// Returns the result for one stage, if written.
    #[must_use]
    pub fn stage_result(&self, stage: StageId) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Returns a debate record, if the debate has started.
    #[must_use]
    pub fn debate(&self, kind: DebateKind) -> Option<&DebateRecord> {
        match kind {
            DebateKind::Research => self.research_debate.as_ref(),
            DebateKind::Risk => self.risk_debate.as_ref(),
        }
    }

    /// Returns the trader's plan, if drafted.
    #[must_use]
    pub fn trader_plan(&self) -> Option<&TradePlan> {
        self.trader_plan.as_ref()
    }

    /// Returns the final verdict, if set.
    #[must_use]
    pub fn final_verdict(&self) -> Option<&FinalVerdict> {
        self.final_verdict.as_ref()
    }

    /// Returns the mutation counter.
    #[must_use]
    pub fn step_counter(&self) -> u64 {
        self.step_counter
    }

    /// Returns true once the final verdict has been written.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the recorded fatal failure, if the run aborted.
    #[must_use]
    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Returns true if anything along the way failed without aborting the run.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.stage_results.iter().any(|r| !r.is_success())
            || DebateKind::ALL
                .iter()
                .filter_map(|k| self.debate(*k))
                .any(DebateRecord::is_degraded)
            || self.trader_plan.as_ref().is_some_and(TradePlan::is_degraded)
            || self.final_verdict.as_ref().is_some_and(|v| v.degraded)
    }

    fn ensure_writable(&self, operation: &str) -> Result<(), StateSealedError> {
        if self.sealed {
            Err(StateSealedError::new(operation))
        } else {
            Ok(())
        }
    }

    fn bump(&mut self) -> u64 {
        self.step_counter += 1;
        self.step_counter
    }

    fn debate_slot(&mut self, kind: DebateKind) -> &mut Option<DebateRecord> {
        match kind {
            DebateKind::Research => &mut self.research_debate,
            DebateKind::Risk => &mut self.risk_debate,
        }
    }

    fn debate_mut(&mut self, kind: DebateKind) -> Result<&mut DebateRecord, TradeflowError> {
        self.debate_slot(kind).as_mut().ok_or_else(|| {
            EngineInvariantViolation::new(format!("{kind} debate written before it was opened"))
                .into()
        })
    }

    pub(crate) fn insert_stage_result(
        &mut self,
        mut result: StageResult,
    ) -> Result<StageResult, TradeflowError> {
        self.ensure_writable("write a stage result")?;
        if self.stage_result(result.stage).is_some() {
            return Err(EngineInvariantViolation::new(format!(
                "stage '{}' result written twice",
                result.stage
            ))
            .into());
        }
        result.step = self.bump();
        self.stage_results.push(result.clone());
        Ok(result)
    }

    pub(crate) fn open_debate(&mut self, kind: DebateKind) -> Result<(), TradeflowError> {
        self.ensure_writable("open a debate")?;
        if self.debate(kind).is_some() {
            return Err(EngineInvariantViolation::new(format!("{kind} debate opened twice")).into());
        }
        let mut record = DebateRecord::open(kind);
        record.opened_step = self.bump();
        *self.debate_slot(kind) = Some(record);
        Ok(())
    }

    pub(crate) fn append_turn(
        &mut self,
        kind: DebateKind,
        speaker: RoleId,
        round: u32,
        content: serde_json::Value,
    ) -> Result<DebateTurn, TradeflowError> {
        self.ensure_writable("append a debate turn")?;
        if self.debate_mut(kind)?.is_concluded() {
            return Err(EngineInvariantViolation::new(format!(
                "turn appended to concluded {kind} debate"
            ))
            .into());
        }
        let step = self.bump();
        let record = self.debate_mut(kind)?;
        let turn = DebateTurn {
            speaker,
            round,
            content,
            timestamp: Utc::now(),
            step,
        };
        record.turns.push(turn.clone());
        if speaker == record.role_b {
            record.rounds_completed = round;
        }
        Ok(turn)
    }

    pub(crate) fn conclude_debate(
        &mut self,
        kind: DebateKind,
        mut judgment: Judgment,
    ) -> Result<Judgment, TradeflowError> {
        self.ensure_writable("conclude a debate")?;
        if self.debate_mut(kind)?.is_concluded() {
            return Err(EngineInvariantViolation::new(format!("{kind} debate concluded twice")).into());
        }
        judgment.step = self.bump();
        let record = self.debate_mut(kind)?;
        record.judgment = Some(judgment.clone());
        record.status = DebateStatus::Concluded;
        Ok(judgment)
    }

    pub(crate) fn set_trader_plan(&mut self, mut plan: TradePlan) -> Result<TradePlan, TradeflowError> {
        self.ensure_writable("write the trader plan")?;
        if self.trader_plan.is_some() {
            return Err(EngineInvariantViolation::new("trader plan written twice").into());
        }
        plan.step = self.bump();
        self.trader_plan = Some(plan.clone());
        Ok(plan)
    }

    /// Writes the verdict and seals the state in one mutation.
    pub(crate) fn seal_with_verdict(
        &mut self,
        mut verdict: FinalVerdict,
    ) -> Result<FinalVerdict, TradeflowError> {
        self.ensure_writable("write the final verdict")?;
        verdict.step = self.bump();
        self.final_verdict = Some(verdict.clone());
        self.sealed = true;
        Ok(verdict)
    }

    pub(crate) fn record_failure(&mut self, reason: impl Into<String>) -> Result<RunFailure, TradeflowError> {
        self.ensure_writable("record a run failure")?;
        let failure = RunFailure {
            reason: reason.into(),
            step: self.bump(),
        };
        self.failure = Some(failure.clone());
        Ok(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Decision, StageStatus};
    use crate::state::records::{FailureKind, FailureReason};

    fn fresh() -> RunState {
        RunState::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            RunConfig::default(),
        )
    }

    fn verdict() -> FinalVerdict {
        FinalVerdict {
            payload: serde_json::json!("HOLD"),
            decision: Decision::Hold,
            degraded: false,
            step: 0,
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = fresh();
        assert_eq!(state.ticker(), "AAPL");
        assert_eq!(state.step_counter(), 0);
        assert!(state.stage_results().is_empty());
        assert!(state.debate(DebateKind::Research).is_none());
        assert!(!state.is_sealed());
        assert!(!state.is_degraded());
    }

    #[test]
    fn test_every_mutation_bumps_step() {
        let mut state = fresh();
        let result = state
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("r")))
            .unwrap();
        assert_eq!(result.step, 1);

        state.open_debate(DebateKind::Research).unwrap();
        let turn = state
            .append_turn(DebateKind::Research, RoleId::Bull, 1, serde_json::json!("buy"))
            .unwrap();
        assert_eq!(turn.step, 3);
        assert_eq!(state.step_counter(), 3);
    }

    #[test]
    fn test_rounds_completed_after_side_b() {
        let mut state = fresh();
        state.open_debate(DebateKind::Research).unwrap();
        state
            .append_turn(DebateKind::Research, RoleId::Bull, 1, serde_json::json!("a"))
            .unwrap();
        assert_eq!(state.debate(DebateKind::Research).unwrap().rounds_completed, 0);
        state
            .append_turn(DebateKind::Research, RoleId::Bear, 1, serde_json::json!("b"))
            .unwrap();
        assert_eq!(state.debate(DebateKind::Research).unwrap().rounds_completed, 1);
    }

    #[test]
    fn test_duplicate_stage_result_is_invariant_violation() {
        let mut state = fresh();
        state
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("r")))
            .unwrap();
        let err = state
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("again")))
            .unwrap_err();
        assert!(matches!(err, TradeflowError::Invariant(_)));
    }

    #[test]
    fn test_turn_before_open_is_invariant_violation() {
        let mut state = fresh();
        let err = state
            .append_turn(DebateKind::Risk, RoleId::Aggressive, 1, serde_json::json!("x"))
            .unwrap_err();
        assert!(matches!(err, TradeflowError::Invariant(_)));
    }

    #[test]
    fn test_sealed_state_rejects_writes() {
        let mut state = fresh();
        state.seal_with_verdict(verdict()).unwrap();
        assert!(state.is_sealed());
        let step = state.step_counter();

        let err = state
            .insert_stage_result(StageResult::ok(StageId::News, serde_json::json!("late")))
            .unwrap_err();
        assert!(matches!(err, TradeflowError::StateSealed(_)));
        assert!(matches!(
            state.seal_with_verdict(verdict()),
            Err(TradeflowError::StateSealed(_))
        ));
        assert_eq!(state.step_counter(), step);
    }

    #[test]
    fn test_degraded_when_stage_failed() {
        let mut state = fresh();
        state
            .insert_stage_result(StageResult::failed(
                StageId::News,
                FailureReason {
                    kind: FailureKind::Capability,
                    message: "down".into(),
                    attempts: 2,
                },
            ))
            .unwrap();
        assert!(state.is_degraded());
        assert_eq!(
            state.stage_result(StageId::News).unwrap().status,
            StageStatus::Failed
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = fresh();
        let copy = state.clone();
        state
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("r")))
            .unwrap();
        assert!(copy.stage_results().is_empty());
        assert_eq!(copy.step_counter(), 0);
    }
}
