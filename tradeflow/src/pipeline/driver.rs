//! The run state machine shared by batch and streaming execution.

use super::retry::invoke_with_policy;
use super::sequencer::{AnalystWave, WaveStep};
use crate::config::RunConfig;
use crate::core::DebateKind;
use crate::debate::{research_seed, risk_seed, DebateSession, DebateStep};
use crate::errors::{EngineInvariantViolation, TradeflowError};
use crate::events::{EventSink, RunEvent, RunEventKind};
use crate::registry::{Roster, StageRegistry};
use crate::signal::extract_decision;
use crate::state::{FailureReason, FinalVerdict, StageResult, StateHandle, TradePlan};
use std::sync::Arc;
use tracing::Instrument;

enum Phase {
    Analysts(AnalystWave),
    ResearchDebate(Box<DebateSession>),
    Trader,
    RiskDebate(Box<DebateSession>),
    Verdict,
    Finished,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Analysts(_) => "analysts",
            Self::ResearchDebate(_) => "research_debate",
            Self::Trader => "trader",
            Self::RiskDebate(_) => "risk_debate",
            Self::Verdict => "verdict",
            Self::Finished => "finished",
        }
    }
}

/// Drives one run, one event at a time.
///
/// Work only happens inside [`next_event`](Self::next_event); dropping the
/// driver drops any in-flight capability calls before they write anything.
pub(crate) struct RunDriver {
    registry: Arc<StageRegistry>,
    roster: Arc<Roster>,
    sink: Arc<dyn EventSink>,
    config: RunConfig,
    handle: StateHandle,
    phase: Phase,
    span: tracing::Span,
}

impl std::fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDriver")
            .field("phase", &self.phase.name())
            .field("step", &self.handle.step())
            .finish_non_exhaustive()
    }
}

impl RunDriver {
    pub(crate) fn new(
        registry: Arc<StageRegistry>,
        roster: Arc<Roster>,
        sink: Arc<dyn EventSink>,
        handle: StateHandle,
    ) -> Self {
        let (config, span) = handle.read(|state| {
            let span = tracing::info_span!(
                "run",
                run_id = %state.run_id(),
                ticker = %state.ticker(),
                trade_date = %state.trade_date(),
            );
            (state.config().clone(), span)
        });
        Self {
            registry,
            roster,
            sink,
            phase: Phase::Analysts(AnalystWave::new(&config)),
            config,
            handle,
            span,
        }
    }

    pub(crate) fn handle(&self) -> &StateHandle {
        &self.handle
    }

    /// Performs the next transition and returns its event, or `None` once the
    /// run has concluded or failed.
    pub(crate) async fn next_event(&mut self) -> Option<RunEvent> {
        if matches!(self.phase, Phase::Finished) {
            return None;
        }

        let span = self.span.clone();
        let kind = match self.advance().instrument(span.clone()).await {
            Ok(kind) => kind,
            Err(err) => span.in_scope(|| self.abort(&err)),
        };

        let event = RunEvent::new(self.handle.step(), kind);
        self.sink.emit(&event).await;
        Some(event)
    }

    async fn advance(&mut self) -> Result<RunEventKind, TradeflowError> {
        loop {
            match &mut self.phase {
                Phase::Analysts(wave) => match wave.next(&self.registry, &self.handle).await? {
                    WaveStep::Skipped(stage, unmet) => {
                        let result = StageResult::failed(stage, FailureReason::from(&unmet));
                        return self.record_stage(result);
                    }
                    WaveStep::Settled(stage, outcome) => {
                        let result = match outcome {
                            Ok(report) => StageResult::ok(stage, report),
                            Err(failure) => {
                                tracing::warn!(stage = %stage, error = %failure, "Analyst stage failed");
                                StageResult::failed(stage, FailureReason::from(&failure))
                            }
                        };
                        return self.record_stage(result);
                    }
                    WaveStep::Done => {
                        let seed = self.handle.read(research_seed);
                        let session = DebateSession::new(
                            DebateKind::Research,
                            &self.roster,
                            self.config.max_debate_rounds(),
                            seed,
                            &self.handle,
                        )?;
                        self.phase = Phase::ResearchDebate(Box::new(session));
                    }
                },
                Phase::ResearchDebate(session) => {
                    return match session.step().await? {
                        DebateStep::TurnAdded(turn) => Ok(RunEventKind::DebateTurnAdded {
                            debate: DebateKind::Research,
                            turn,
                        }),
                        DebateStep::Concluded(judgment) => {
                            self.phase = Phase::Trader;
                            Ok(RunEventKind::DebateConcluded {
                                debate: DebateKind::Research,
                                judgment,
                            })
                        }
                    };
                }
                Phase::Trader => return self.draft_plan().await,
                Phase::RiskDebate(session) => {
                    return match session.step().await? {
                        DebateStep::TurnAdded(turn) => Ok(RunEventKind::DebateTurnAdded {
                            debate: DebateKind::Risk,
                            turn,
                        }),
                        DebateStep::Concluded(judgment) => {
                            self.phase = Phase::Verdict;
                            Ok(RunEventKind::DebateConcluded {
                                debate: DebateKind::Risk,
                                judgment,
                            })
                        }
                    };
                }
                Phase::Verdict => return self.seal(),
                Phase::Finished => {
                    return Err(EngineInvariantViolation::new("run advanced after it finished").into())
                }
            }
        }
    }

    fn record_stage(&self, result: StageResult) -> Result<RunEventKind, TradeflowError> {
        let stage = result.stage;
        let result = self.handle.stage_slot(stage).fill(result)?;
        tracing::info!(
            stage = %stage,
            status = %result.status,
            step = result.step,
            "Analyst stage settled"
        );
        Ok(RunEventKind::StageCompleted { stage, result })
    }

    async fn draft_plan(&mut self) -> Result<RunEventKind, TradeflowError> {
        let trader = self.roster.trader()?;
        let view = self.handle.snapshot();
        let judgment = view
            .debate(DebateKind::Research)
            .and_then(|d| d.judgment.clone())
            .ok_or_else(|| EngineInvariantViolation::new("trader reached before the research judgment"))?;

        let outcome = invoke_with_policy(
            "trader",
            self.config.retry(),
            self.config.invocation_timeout(),
            || trader.draft_plan(&judgment, &view, &self.config),
        )
        .await;

        let plan = match outcome {
            Ok(payload) => TradePlan::drafted(payload),
            Err(failure) => {
                tracing::warn!(error = %failure, "Trader failed, continuing with degraded plan");
                TradePlan::failed(FailureReason::from(&failure))
            }
        };
        let plan = self.handle.write(|state| state.set_trader_plan(plan))?;
        tracing::info!(
            step = plan.step,
            degraded = plan.is_degraded(),
            model = %self.config.model_for(trader.model_tier()),
            "Trade plan drafted"
        );

        let seed = self.handle.read(risk_seed);
        let session = DebateSession::new(
            DebateKind::Risk,
            &self.roster,
            self.config.max_risk_rounds(),
            seed,
            &self.handle,
        )?;
        self.phase = Phase::RiskDebate(Box::new(session));
        Ok(RunEventKind::PlanDrafted { plan })
    }

    fn seal(&mut self) -> Result<RunEventKind, TradeflowError> {
        let judgment = self
            .handle
            .read(|state| state.debate(DebateKind::Risk).and_then(|d| d.judgment.clone()))
            .ok_or_else(|| EngineInvariantViolation::new("verdict reached before the risk judgment"))?;

        let verdict = FinalVerdict {
            decision: extract_decision(&judgment.payload),
            payload: judgment.payload,
            degraded: judgment.degraded,
            step: 0,
        };
        let verdict = self.handle.write(|state| state.seal_with_verdict(verdict))?;
        self.phase = Phase::Finished;

        let degraded_run = self.handle.read(crate::state::RunState::is_degraded);
        tracing::info!(
            decision = %verdict.decision,
            step = verdict.step,
            degraded = degraded_run,
            "Run concluded"
        );
        Ok(RunEventKind::RunConcluded { verdict })
    }

    fn abort(&mut self, err: &TradeflowError) -> RunEventKind {
        let reason = err.to_string();
        tracing::error!(phase = self.phase.name(), error = %reason, "Run aborted");
        if let Err(record_err) = self.handle.write(|state| state.record_failure(reason.clone())) {
            tracing::warn!(error = %record_err, "Could not record run failure");
        }
        self.phase = Phase::Finished;
        RunEventKind::RunFailed { reason }
    }
}
