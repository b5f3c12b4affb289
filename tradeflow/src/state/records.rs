//! Records written into the run state.
//!
//! Every record carries the `step` at which it was written so that diffs can
//! be ordered causally.

use crate::core::{DebateKind, DebateStatus, Decision, RoleId, StageId, StageStatus};
use crate::errors::{CapabilityFailure, DependencyUnmet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a capability or stage did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The capability returned an error on every attempt.
    Capability,
    /// The last attempt exceeded the invocation timeout.
    Timeout,
    /// A prerequisite stage failed or was not active.
    DependencyUnmet,
}

/// A recorded, non-fatal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
    /// Attempts made before giving up (zero when never invoked).
    pub attempts: u32,
}

impl From<&CapabilityFailure> for FailureReason {
    fn from(failure: &CapabilityFailure) -> Self {
        Self {
            kind: if failure.timed_out {
                FailureKind::Timeout
            } else {
                FailureKind::Capability
            },
            message: failure.reason.clone(),
            attempts: failure.attempts,
        }
    }
}

impl From<&DependencyUnmet> for FailureReason {
    fn from(err: &DependencyUnmet) -> Self {
        Self {
            kind: FailureKind::DependencyUnmet,
            message: err.to_string(),
            attempts: 0,
        }
    }
}

/// Output of one analyst stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced it.
    pub stage: StageId,
    /// Opaque report payload; null when the stage failed. A successful
    /// stage may also report null, so read `status` to tell them apart.
    pub report: serde_json::Value,
    /// Outcome.
    pub status: StageStatus,
    /// Failure details when `status` is failed.
    pub error: Option<FailureReason>,
    /// When the stage finished.
    pub completed_at: DateTime<Utc>,
    /// Step counter value assigned when written.
    pub step: u64,
}

impl StageResult {
    /// Creates a successful result. The step is assigned on write.
    #[must_use]
    pub fn ok(stage: StageId, report: serde_json::Value) -> Self {
        Self {
            stage,
            report,
            status: StageStatus::Ok,
            error: None,
            completed_at: Utc::now(),
            step: 0,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(stage: StageId, reason: FailureReason) -> Self {
        Self {
            stage,
            report: serde_json::Value::Null,
            status: StageStatus::Failed,
            error: Some(reason),
            completed_at: Utc::now(),
            step: 0,
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// One utterance in a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTurn {
    /// Who spoke.
    pub speaker: RoleId,
    /// Round number, 1-indexed.
    pub round: u32,
    /// Opaque utterance payload.
    pub content: serde_json::Value,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
    /// Step counter value assigned when written.
    pub step: u64,
}

/// The terminal judgment of a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Synthesis output; null when the debate aborted or synthesis failed.
    pub payload: serde_json::Value,
    /// True when produced despite a failure.
    pub degraded: bool,
    /// Why the judgment is degraded.
    pub reason: Option<FailureReason>,
    /// Step counter value assigned when written.
    pub step: u64,
}

impl Judgment {
    /// A judgment from a successful synthesis.
    #[must_use]
    pub fn synthesized(payload: serde_json::Value) -> Self {
        Self {
            payload,
            degraded: false,
            reason: None,
            step: 0,
        }
    }

    /// A degraded judgment with no usable payload.
    #[must_use]
    pub fn degraded(reason: FailureReason) -> Self {
        Self {
            payload: serde_json::Value::Null,
            degraded: true,
            reason: Some(reason),
            step: 0,
        }
    }
}

/// One full debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    /// Which debate this is.
    pub kind: DebateKind,
    /// Opening role.
    pub role_a: RoleId,
    /// Responding role.
    pub role_b: RoleId,
    /// Turns in speaking order.
    pub turns: Vec<DebateTurn>,
    /// Rounds in which both roles have spoken.
    pub rounds_completed: u32,
    /// Terminal judgment, once concluded.
    pub judgment: Option<Judgment>,
    /// Lifecycle status.
    pub status: DebateStatus,
    /// Step counter value when the record was opened.
    pub opened_step: u64,
}

impl DebateRecord {
    /// Creates an empty in-progress record for the debate's fixed roles.
    #[must_use]
    pub fn open(kind: DebateKind) -> Self {
        let (role_a, role_b) = kind.roles();
        Self {
            kind,
            role_a,
            role_b,
            turns: Vec::new(),
            rounds_completed: 0,
            judgment: None,
            status: DebateStatus::InProgress,
            opened_step: 0,
        }
    }

    /// Returns true once a judgment has been written.
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.status == DebateStatus::Concluded
    }

    /// Returns true if the judgment is degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.judgment.as_ref().is_some_and(|j| j.degraded)
    }
}

/// The trader's drafted plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    /// Plan payload; null when the trader failed.
    pub payload: serde_json::Value,
    /// Failure details when the trader failed.
    pub error: Option<FailureReason>,
    /// Step counter value assigned when written.
    pub step: u64,
}

impl TradePlan {
    /// A drafted plan.
    #[must_use]
    pub fn drafted(payload: serde_json::Value) -> Self {
        Self {
            payload,
            error: None,
            step: 0,
        }
    }

    /// A plan slot recording the trader's failure.
    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            payload: serde_json::Value::Null,
            error: Some(reason),
            step: 0,
        }
    }

    /// Returns true if the trader failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the payload of a drafted plan, or `None` if the trader failed.
    #[must_use]
    pub fn drafted_payload(&self) -> Option<&serde_json::Value> {
        if self.is_degraded() {
            None
        } else {
            Some(&self.payload)
        }
    }
}

/// The run's terminal verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVerdict {
    /// The risk judgment payload.
    pub payload: serde_json::Value,
    /// Decision label read from the payload.
    pub decision: Decision,
    /// True when the risk judgment was degraded.
    pub degraded: bool,
    /// Step counter value assigned when written.
    pub step: u64,
}

/// A fatal failure recorded on an aborted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Why the run was aborted.
    pub reason: String,
    /// Step counter value assigned when written.
    pub step: u64,
}
