//! Events emitted while a run progresses.

use crate::core::{DebateKind, StageId};
use crate::state::{DebateTurn, FinalVerdict, Judgment, StageResult, TradePlan};
use serde::{Deserialize, Serialize};

/// One observable transition of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// The state's step counter right after the transition.
    pub step: u64,
    /// What happened.
    #[serde(flatten)]
    pub kind: RunEventKind,
}

/// The transition carried by a [`RunEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    /// An analyst stage settled, successfully or not.
    StageCompleted {
        /// The stage.
        stage: StageId,
        /// Its recorded result.
        result: StageResult,
    },
    /// A debater spoke.
    DebateTurnAdded {
        /// Which debate.
        debate: DebateKind,
        /// The recorded turn.
        turn: DebateTurn,
    },
    /// A debate reached its judgment.
    DebateConcluded {
        /// Which debate.
        debate: DebateKind,
        /// The judgment.
        judgment: Judgment,
    },
    /// The trader's plan slot was written.
    PlanDrafted {
        /// The plan, possibly degraded.
        plan: TradePlan,
    },
    /// The verdict was written and the state sealed.
    RunConcluded {
        /// The final verdict.
        verdict: FinalVerdict,
    },
    /// The run aborted on an engine invariant violation.
    RunFailed {
        /// Why.
        reason: String,
    },
}

impl RunEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(step: u64, kind: RunEventKind) -> Self {
        Self { step, kind }
    }

    /// Returns the dotted event type used by sinks.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            RunEventKind::StageCompleted { .. } => "stage.completed",
            RunEventKind::DebateTurnAdded { .. } => "debate.turn",
            RunEventKind::DebateConcluded { .. } => "debate.concluded",
            RunEventKind::PlanDrafted { .. } => "plan.drafted",
            RunEventKind::RunConcluded { .. } => "run.concluded",
            RunEventKind::RunFailed { .. } => "run.failed",
        }
    }

    /// Returns true for the last event of a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            RunEventKind::RunConcluded { .. } | RunEventKind::RunFailed { .. }
        )
    }

    /// Returns the event as a JSON payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
