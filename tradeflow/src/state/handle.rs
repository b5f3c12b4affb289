//! Shared access to the run state.

use super::records::{DebateTurn, Judgment, StageResult};
use super::run_state::RunState;
use crate::core::{DebateKind, RoleId, StageId};
use crate::errors::{EngineInvariantViolation, TradeflowError};
use parking_lot::RwLock;
use std::sync::Arc;

/// Handle to the run state of one run.
///
/// All writes are serialized through a single lock; readers outside the
/// engine only ever receive snapshots.
#[derive(Debug, Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<RunState>>,
}

impl StateHandle {
    /// Wraps a state. Mutation stays with the engine.
    #[must_use]
    pub fn new(state: RunState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns an independent deep copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> RunState {
        self.inner.read().clone()
    }

    /// Returns the current step counter without copying the state.
    #[must_use]
    pub fn step(&self) -> u64 {
        self.inner.read().step_counter()
    }

    /// Returns true once the final verdict has sealed the state.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.read().is_sealed()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&RunState) -> R) -> R {
        f(&self.inner.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Hands out a writer for exactly one stage result.
    pub(crate) fn stage_slot(&self, stage: StageId) -> StageSlot {
        StageSlot {
            handle: self.clone(),
            stage,
        }
    }

    /// Hands out a writer scoped to one debate record.
    pub(crate) fn debate_writer(&self, kind: DebateKind) -> DebateWriter {
        DebateWriter {
            handle: self.clone(),
            kind,
        }
    }
}

/// Writes the result of a single analyst stage. Consumed on use.
#[derive(Debug)]
pub(crate) struct StageSlot {
    handle: StateHandle,
    stage: StageId,
}

impl StageSlot {
    pub(crate) fn fill(self, result: StageResult) -> Result<StageResult, TradeflowError> {
        if result.stage != self.stage {
            return Err(EngineInvariantViolation::new(format!(
                "slot for stage '{}' received result for '{}'",
                self.stage, result.stage
            ))
            .into());
        }
        self.handle.write(|state| state.insert_stage_result(result))
    }
}

/// Writes turns and the judgment of one debate record.
#[derive(Debug, Clone)]
pub(crate) struct DebateWriter {
    handle: StateHandle,
    kind: DebateKind,
}

impl DebateWriter {
    pub(crate) fn kind(&self) -> DebateKind {
        self.kind
    }

    pub(crate) fn handle(&self) -> &StateHandle {
        &self.handle
    }

    pub(crate) fn open(&self) -> Result<(), TradeflowError> {
        self.handle.write(|state| state.open_debate(self.kind))
    }

    pub(crate) fn append_turn(
        &self,
        speaker: RoleId,
        round: u32,
        content: serde_json::Value,
    ) -> Result<DebateTurn, TradeflowError> {
        self.handle
            .write(|state| state.append_turn(self.kind, speaker, round, content))
    }

    pub(crate) fn conclude(&self, judgment: Judgment) -> Result<Judgment, TradeflowError> {
        self.handle
            .write(|state| state.conclude_debate(self.kind, judgment))
    }

    pub(crate) fn turns(&self) -> Vec<DebateTurn> {
        self.handle.read(|state| {
            state
                .debate(self.kind)
                .map(|record| record.turns.clone())
                .unwrap_or_default()
        })
    }
}
