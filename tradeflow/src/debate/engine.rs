//! Round-limited debate state machine.

use crate::capabilities::{DebateRoleCapability, SynthesisCapability};
use crate::config::RunConfig;
use crate::core::{DebateKind, RoleId, Side};
use crate::errors::{ConfigError, EngineInvariantViolation, TradeflowError};
use crate::pipeline::invoke_with_policy;
use crate::registry::Roster;
use crate::state::{DebateRecord, DebateTurn, DebateWriter, FailureReason, Judgment, StateHandle};
use std::fmt;
use std::sync::Arc;

/// Where a debate currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    /// The record has not been opened yet.
    NotStarted,
    /// `side` speaks next in `round`.
    Speaking {
        /// Current round, 1-indexed.
        round: u32,
        /// The side about to speak.
        side: Side,
    },
    /// All rounds are spoken; synthesis runs next.
    Concluding,
    /// A judgment has been written.
    Concluded,
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Speaking { round, side } => write!(f, "speaking(round={round}, side={side:?})"),
            Self::Concluding => write!(f, "concluding"),
            Self::Concluded => write!(f, "concluded"),
        }
    }
}

/// What one call to [`DebateSession::step`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DebateStep {
    /// A turn was appended to the record.
    TurnAdded(DebateTurn),
    /// The debate concluded with this judgment.
    Concluded(Judgment),
}

/// One debate in progress.
///
/// Each [`step`](Self::step) performs exactly one capability call: a turn,
/// or the final synthesis. A turn that still fails after its retry aborts
/// the debate with a degraded judgment and no synthesis.
#[derive(Debug)]
pub struct DebateSession {
    writer: DebateWriter,
    side_a: Arc<dyn DebateRoleCapability>,
    side_b: Arc<dyn DebateRoleCapability>,
    judge: Arc<dyn SynthesisCapability>,
    max_rounds: u32,
    seed: serde_json::Value,
    config: RunConfig,
    phase: DebatePhase,
}

impl DebateSession {
    /// Prepares a debate on `handle`. Nothing is written until the first step.
    pub fn new(
        kind: DebateKind,
        roster: &Roster,
        max_rounds: u32,
        seed: serde_json::Value,
        handle: &StateHandle,
    ) -> Result<Self, TradeflowError> {
        if max_rounds == 0 {
            return Err(ConfigError::InvalidRounds {
                field: "max_rounds",
                value: max_rounds,
            }
            .into());
        }
        let (role_a, role_b) = kind.roles();
        Ok(Self {
            writer: handle.debate_writer(kind),
            side_a: roster.role(role_a)?,
            side_b: roster.role(role_b)?,
            judge: roster.judge(kind)?,
            max_rounds,
            seed,
            config: handle.read(|state| state.config().clone()),
            phase: DebatePhase::NotStarted,
        })
    }

    /// Returns the debate kind.
    #[must_use]
    pub fn kind(&self) -> DebateKind {
        self.writer.kind()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    /// Returns true once the judgment is written.
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.phase == DebatePhase::Concluded
    }

    /// Returns a copy of the debate record as written so far.
    pub fn record(&self) -> Result<DebateRecord, TradeflowError> {
        let kind = self.kind();
        self.writer.handle().read(|state| {
            state.debate(kind).cloned().ok_or_else(|| {
                EngineInvariantViolation::new(format!("{kind} debate record missing")).into()
            })
        })
    }

    /// Advances the debate by one capability call.
    pub async fn step(&mut self) -> Result<DebateStep, TradeflowError> {
        match self.phase {
            DebatePhase::NotStarted => {
                self.writer.open()?;
                tracing::info!(debate = %self.kind(), max_rounds = self.max_rounds, "Debate opened");
                self.speak(1, Side::A).await
            }
            DebatePhase::Speaking { round, side } => self.speak(round, side).await,
            DebatePhase::Concluding => self.synthesize().await,
            DebatePhase::Concluded => Err(EngineInvariantViolation::new(format!(
                "{} debate stepped after conclusion",
                self.kind()
            ))
            .into()),
        }
    }

    async fn speak(&mut self, round: u32, side: Side) -> Result<DebateStep, TradeflowError> {
        let kind = self.kind();
        let role = kind.role(side);
        let capability = match side {
            Side::A => Arc::clone(&self.side_a),
            Side::B => Arc::clone(&self.side_b),
        };
        let history = self.writer.turns();
        let label = format!("{kind}:{role}");

        let outcome = invoke_with_policy(
            &label,
            self.config.retry(),
            self.config.invocation_timeout(),
            || capability.speak(&history, &self.seed, &self.config),
        )
        .await;

        match outcome {
            Ok(content) => {
                let turn = self.writer.append_turn(role, round, content)?;
                tracing::debug!(
                    debate = %kind,
                    role = %role,
                    round,
                    step = turn.step,
                    model = %self.config.model_for(capability.model_tier()),
                    "Debate turn recorded"
                );
                self.phase = self.after(round, side);
                Ok(DebateStep::TurnAdded(turn))
            }
            Err(failure) => {
                tracing::warn!(
                    debate = %kind,
                    role = %role,
                    round,
                    error = %failure,
                    "Debate aborted, concluding with degraded judgment"
                );
                self.finish(Judgment::degraded(FailureReason::from(&failure)))
            }
        }
    }

    async fn synthesize(&mut self) -> Result<DebateStep, TradeflowError> {
        let kind = self.kind();
        let history = self.writer.turns();
        let judge = Arc::clone(&self.judge);
        let label = format!("{kind}:judge");

        let outcome = invoke_with_policy(
            &label,
            self.config.retry(),
            self.config.invocation_timeout(),
            || judge.synthesize(&history),
        )
        .await;

        let judgment = match outcome {
            Ok(payload) => Judgment::synthesized(payload),
            Err(failure) => {
                tracing::warn!(debate = %kind, error = %failure, "Synthesis failed");
                Judgment::degraded(FailureReason::from(&failure))
            }
        };
        tracing::debug!(
            debate = %kind,
            model = %self.config.model_for(judge.model_tier()),
            degraded = judgment.degraded,
            "Debate synthesized"
        );
        self.finish(judgment)
    }

    fn after(&self, round: u32, side: Side) -> DebatePhase {
        match side {
            Side::A => DebatePhase::Speaking { round, side: Side::B },
            Side::B if round >= self.max_rounds => DebatePhase::Concluding,
            Side::B => DebatePhase::Speaking {
                round: round + 1,
                side: Side::A,
            },
        }
    }

    fn finish(&mut self, judgment: Judgment) -> Result<DebateStep, TradeflowError> {
        let judgment = self.writer.conclude(judgment)?;
        self.phase = DebatePhase::Concluded;
        let record = self.record()?;
        check_concluded(&record, self.max_rounds)?;
        tracing::info!(
            debate = %record.kind,
            turns = record.turns.len(),
            rounds = record.rounds_completed,
            degraded = judgment.degraded,
            "Debate concluded"
        );
        Ok(DebateStep::Concluded(judgment))
    }
}

/// Checks the shape of a concluded record.
///
/// A non-degraded debate holds exactly `2 * max_rounds` turns alternating
/// A, B, A, ... with round numbers advancing after side B.
fn check_concluded(
    record: &DebateRecord,
    max_rounds: u32,
) -> Result<(), EngineInvariantViolation> {
    let Some(judgment) = &record.judgment else {
        return Err(EngineInvariantViolation::new(format!(
            "{} debate concluded without a judgment",
            record.kind
        )));
    };
    if judgment.degraded {
        return Ok(());
    }

    let expected = usize::try_from(max_rounds).unwrap_or(usize::MAX).saturating_mul(2);
    if record.turns.len() != expected {
        return Err(EngineInvariantViolation::new(format!(
            "{} debate has {} turns, expected {expected}",
            record.kind,
            record.turns.len()
        )));
    }

    for (i, turn) in record.turns.iter().enumerate() {
        let expected_speaker: RoleId = if i % 2 == 0 { record.role_a } else { record.role_b };
        let expected_round = u32::try_from(i / 2 + 1).unwrap_or(u32::MAX);
        if turn.speaker != expected_speaker || turn.round != expected_round {
            return Err(EngineInvariantViolation::new(format!(
                "{} debate turn {i} out of order: {} in round {}",
                record.kind, turn.speaker, turn.round
            )));
        }
    }
    Ok(())
}

/// Runs a whole debate to its judgment.
pub async fn run_debate(
    kind: DebateKind,
    roster: &Roster,
    max_rounds: u32,
    seed: serde_json::Value,
    handle: &StateHandle,
) -> Result<DebateRecord, TradeflowError> {
    let mut session = DebateSession::new(kind, roster, max_rounds, seed, handle)?;
    while !session.is_concluded() {
        session.step().await?;
    }
    session.record()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DebateStatus;
    use crate::state::{FailureKind, RunState};
    use crate::testing::{
        assert_alternating_turns, test_config, test_roster, CountingDebater, FailingDebater,
        FlakyDebater, StaticJudge,
    };
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn handle() -> StateHandle {
        StateHandle::new(RunState::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            test_config(),
        ))
    }

    #[tokio::test]
    async fn test_two_rounds_alternate() {
        let handle = handle();
        let record = run_debate(
            DebateKind::Research,
            &test_roster(),
            2,
            serde_json::json!({"reports": {}}),
            &handle,
        )
        .await
        .unwrap();

        assert_eq!(record.turns.len(), 4);
        assert_eq!(record.rounds_completed, 2);
        assert_eq!(record.status, DebateStatus::Concluded);
        assert_alternating_turns(&record);
        assert!(!record.is_degraded());
    }

    #[tokio::test]
    async fn test_step_by_step_phases() {
        let handle = handle();
        let mut session = DebateSession::new(
            DebateKind::Risk,
            &test_roster(),
            1,
            serde_json::Value::Null,
            &handle,
        )
        .unwrap();
        assert_eq!(session.phase(), DebatePhase::NotStarted);

        let first = session.step().await.unwrap();
        assert!(matches!(first, DebateStep::TurnAdded(ref t) if t.speaker == RoleId::Aggressive));
        assert_eq!(
            session.phase(),
            DebatePhase::Speaking {
                round: 1,
                side: Side::B
            }
        );

        let second = session.step().await.unwrap();
        assert!(matches!(second, DebateStep::TurnAdded(ref t) if t.speaker == RoleId::Conservative));
        assert_eq!(session.phase(), DebatePhase::Concluding);

        let last = session.step().await.unwrap();
        assert!(matches!(last, DebateStep::Concluded(ref j) if !j.degraded));
        assert!(session.is_concluded());
        assert!(matches!(
            session.step().await,
            Err(TradeflowError::Invariant(_))
        ));
    }

    #[tokio::test]
    async fn test_speaker_sees_prior_turns() {
        let handle = handle();
        let bear = Arc::new(CountingDebater::new());
        let roster = test_roster().with_role(RoleId::Bear, bear.clone());

        let record = run_debate(DebateKind::Research, &roster, 2, serde_json::Value::Null, &handle)
            .await
            .unwrap();

        assert_eq!(bear.seen_history_lengths(), vec![1, 3]);
        assert_eq!(record.turns[1].content, serde_json::json!({"heard": 1}));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let handle = handle();
        let roster = test_roster().with_role(RoleId::Bull, Arc::new(FlakyDebater::new(1)));
        let record = run_debate(DebateKind::Research, &roster, 1, serde_json::Value::Null, &handle)
            .await
            .unwrap();
        assert_eq!(record.turns.len(), 2);
        assert!(!record.is_degraded());
    }

    #[tokio::test]
    async fn test_second_failure_aborts_without_synthesis() {
        let handle = handle();
        let judge = Arc::new(StaticJudge::new("never"));
        let roster = test_roster()
            .with_role(RoleId::Bear, Arc::new(FailingDebater::new("model overloaded")))
            .with_judge(DebateKind::Research, judge.clone());

        let record = run_debate(DebateKind::Research, &roster, 2, serde_json::Value::Null, &handle)
            .await
            .unwrap();

        assert_eq!(record.turns.len(), 1);
        assert_eq!(record.turns[0].speaker, RoleId::Bull);
        assert!(record.is_concluded());
        let judgment = record.judgment.unwrap();
        assert!(judgment.degraded);
        assert_eq!(judgment.payload, serde_json::Value::Null);
        let reason = judgment.reason.unwrap();
        assert_eq!(reason.kind, FailureKind::Capability);
        assert!(reason.message.contains("model overloaded"));
        assert_eq!(judge.call_count(), 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_degrades() {
        let handle = handle();
        let roster = test_roster().with_judge(DebateKind::Risk, Arc::new(StaticJudge::failing()));
        let record = run_debate(DebateKind::Risk, &roster, 1, serde_json::Value::Null, &handle)
            .await
            .unwrap();

        assert_eq!(record.turns.len(), 2);
        assert!(record.is_degraded());
        assert!(handle.snapshot().is_degraded());
    }

    #[tokio::test]
    async fn test_zero_rounds_rejected() {
        let err = DebateSession::new(
            DebateKind::Research,
            &test_roster(),
            0,
            serde_json::Value::Null,
            &handle(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TradeflowError::Config(ConfigError::InvalidRounds { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_role_rejected() {
        let err = DebateSession::new(
            DebateKind::Research,
            &Roster::new(),
            1,
            serde_json::Value::Null,
            &handle(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TradeflowError::Config(ConfigError::MissingRole(RoleId::Bull))
        ));
    }

    #[test]
    fn test_check_concluded_rejects_short_history() {
        let mut record = DebateRecord::open(DebateKind::Research);
        record.judgment = Some(Judgment::synthesized(serde_json::json!("HOLD")));
        let err = check_concluded(&record, 1).unwrap_err();
        assert!(err.message.contains("0 turns"));

        record.judgment = None;
        assert!(check_concluded(&record, 1).is_err());
    }
}
