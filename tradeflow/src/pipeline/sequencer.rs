//! Scheduling of the analyst stages.
//!
//! Active stages are considered in canonical order. A stage launches once
//! every dependency has succeeded; launched stages are polled together by
//! the run coordinator, so independent analysts make progress concurrently
//! while results are still written one at a time. A stage whose dependency
//! failed or is not active is never invoked.

use super::retry::invoke_with_policy;
use crate::config::RunConfig;
use crate::core::StageId;
use crate::errors::{CapabilityFailure, DependencyUnmet, EngineInvariantViolation, TradeflowError};
use crate::registry::StageRegistry;
use crate::state::{RunState, StateHandle};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;

type AnalystOutcome = (StageId, Result<serde_json::Value, CapabilityFailure>);

/// What the wave produced on one call to [`AnalystWave::next`].
#[derive(Debug)]
pub(crate) enum WaveStep {
    /// A stage was skipped for an unmet dependency.
    Skipped(StageId, DependencyUnmet),
    /// A launched stage settled.
    Settled(StageId, Result<serde_json::Value, CapabilityFailure>),
    /// Every active stage has a result.
    Done,
}

enum Readiness {
    Ready,
    Waiting,
    Unmet(StageId),
}

/// The analyst phase of one run.
pub(crate) struct AnalystWave {
    pending: Vec<StageId>,
    in_flight: FuturesUnordered<BoxFuture<'static, AnalystOutcome>>,
}

impl std::fmt::Debug for AnalystWave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalystWave")
            .field("pending", &self.pending)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl AnalystWave {
    pub(crate) fn new(config: &RunConfig) -> Self {
        Self {
            pending: config.active_stages().iter().copied().collect(),
            in_flight: FuturesUnordered::new(),
        }
    }

    fn readiness(stage: StageId, registry: &StageRegistry, state: &RunState) -> Readiness {
        let mut waiting = false;
        for dep in registry.dependencies(stage) {
            if !state.config().is_active(dep) {
                return Readiness::Unmet(dep);
            }
            match state.stage_result(dep) {
                Some(result) if !result.is_success() => return Readiness::Unmet(dep),
                Some(_) => {}
                None => waiting = true,
            }
        }
        if waiting {
            Readiness::Waiting
        } else {
            Readiness::Ready
        }
    }

    /// Launches what is ready and returns the next thing to record.
    pub(crate) async fn next(
        &mut self,
        registry: &StageRegistry,
        handle: &StateHandle,
    ) -> Result<WaveStep, TradeflowError> {
        let view = handle.snapshot();

        let mut ready = Vec::new();
        let mut unmet = None;
        for stage in &self.pending {
            match Self::readiness(*stage, registry, &view) {
                Readiness::Unmet(dependency) => {
                    unmet = Some(DependencyUnmet {
                        stage: *stage,
                        dependency,
                    });
                    break;
                }
                Readiness::Ready => ready.push(*stage),
                Readiness::Waiting => {}
            }
        }

        if let Some(unmet) = unmet {
            self.pending.retain(|s| *s != unmet.stage);
            tracing::warn!(
                stage = %unmet.stage,
                dependency = %unmet.dependency,
                "Skipping analyst stage, dependency unmet"
            );
            return Ok(WaveStep::Skipped(unmet.stage, unmet));
        }

        for stage in ready {
            self.pending.retain(|s| *s != stage);
            self.launch(stage, registry, view.clone())?;
        }

        if self.in_flight.is_empty() {
            if self.pending.is_empty() {
                return Ok(WaveStep::Done);
            }
            return Err(EngineInvariantViolation::new(format!(
                "analyst stages deadlocked; remaining: {:?}",
                self.pending
            ))
            .into());
        }

        match self.in_flight.next().await {
            Some((stage, outcome)) => Ok(WaveStep::Settled(stage, outcome)),
            None => Err(EngineInvariantViolation::new("in-flight analyst set drained unexpectedly").into()),
        }
    }

    fn launch(
        &mut self,
        stage: StageId,
        registry: &StageRegistry,
        view: RunState,
    ) -> Result<(), TradeflowError> {
        let entry = registry.get(stage).ok_or_else(|| {
            EngineInvariantViolation::new(format!("active stage '{stage}' has no capability"))
        })?;
        let capability = Arc::clone(&entry.capability);
        let config = view.config().clone();
        tracing::debug!(
            stage = %stage,
            model = %config.model_for(capability.model_tier()),
            online_tools = config.online_tools(),
            "Analyst stage launched"
        );

        let fut = async move {
            let label = format!("analyst:{stage}");
            let ticker = view.ticker().to_string();
            let trade_date = view.trade_date();
            let outcome = invoke_with_policy(
                &label,
                config.retry(),
                config.invocation_timeout(),
                || capability.analyze(&ticker, trade_date, &config, &view),
            )
            .await;
            (stage, outcome)
        };
        self.in_flight.push(fut.boxed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingAnalyst, StaticAnalyst};
    use chrono::NaiveDate;

    fn handle(config: RunConfig) -> StateHandle {
        StateHandle::new(RunState::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            config,
        ))
    }

    #[tokio::test]
    async fn test_independent_stages_all_settle() {
        let config = RunConfig::builder()
            .active_stages([StageId::Market, StageId::News])
            .retry(crate::pipeline::RetryPolicy::immediate())
            .build()
            .unwrap();
        let registry = StageRegistry::new()
            .register(StageId::Market, Arc::new(StaticAnalyst::new("m")))
            .register(StageId::News, Arc::new(StaticAnalyst::new("n")));
        let handle = handle(config.clone());
        let mut wave = AnalystWave::new(&config);

        let mut settled = Vec::new();
        loop {
            match wave.next(&registry, &handle).await.unwrap() {
                WaveStep::Settled(stage, outcome) => {
                    assert!(outcome.is_ok());
                    settled.push(stage);
                }
                WaveStep::Skipped(stage, _) => panic!("unexpected skip of {stage}"),
                WaveStep::Done => break,
            }
        }
        settled.sort();
        assert_eq!(settled, vec![StageId::Market, StageId::News]);
    }

    #[tokio::test]
    async fn test_inactive_dependency_skips() {
        let config = RunConfig::builder()
            .active_stages([StageId::Fundamentals])
            .build()
            .unwrap();
        let registry = StageRegistry::new()
            .register(StageId::Market, Arc::new(StaticAnalyst::new("m")))
            .register_with_dependencies(
                StageId::Fundamentals,
                Arc::new(StaticAnalyst::new("f")),
                [StageId::Market],
            );
        let handle = handle(config.clone());
        let mut wave = AnalystWave::new(&config);

        match wave.next(&registry, &handle).await.unwrap() {
            WaveStep::Skipped(stage, unmet) => {
                assert_eq!(stage, StageId::Fundamentals);
                assert_eq!(unmet.dependency, StageId::Market);
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(matches!(
            wave.next(&registry, &handle).await.unwrap(),
            WaveStep::Done
        ));
    }

    #[tokio::test]
    async fn test_dependent_waits_for_dependency() {
        let config = RunConfig::builder()
            .active_stages([StageId::Market, StageId::Fundamentals])
            .retry(crate::pipeline::RetryPolicy::immediate())
            .build()
            .unwrap();
        let registry = StageRegistry::new()
            .register(StageId::Market, Arc::new(FailingAnalyst::new("feed down")))
            .register_with_dependencies(
                StageId::Fundamentals,
                Arc::new(StaticAnalyst::new("f")),
                [StageId::Market],
            );
        let handle = handle(config.clone());
        let mut wave = AnalystWave::new(&config);

        let WaveStep::Settled(stage, outcome) = wave.next(&registry, &handle).await.unwrap() else {
            panic!("expected market to settle first");
        };
        assert_eq!(stage, StageId::Market);
        assert!(outcome.is_err());
        assert_eq!(wave.in_flight.len(), 0);

        handle
            .stage_slot(stage)
            .fill(crate::state::StageResult::failed(
                stage,
                crate::state::FailureReason::from(&outcome.unwrap_err()),
            ))
            .unwrap();

        assert!(matches!(
            wave.next(&registry, &handle).await.unwrap(),
            WaveStep::Skipped(StageId::Fundamentals, _)
        ));
    }
}
