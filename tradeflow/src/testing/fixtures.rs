//! Test fixtures for pipeline testing.

use std::sync::Arc;
use std::time::Duration;

use super::mocks::{StaticAnalyst, StaticDebater, StaticJudge, StaticTrader};
use crate::capabilities::{
    AnalystCapability, DebateRoleCapability, SynthesisCapability, TraderCapability,
};
use crate::config::RunConfig;
use crate::core::{DebateKind, RoleId, StageId};
use crate::errors::ConfigError;
use crate::events::EventSink;
use crate::pipeline::{Pipeline, RetryPolicy};
use crate::registry::Roster;

/// A config with immediate retries and a short timeout.
#[must_use]
pub fn test_config() -> RunConfig {
    test_config_builder()
        .build()
        .unwrap_or_else(|e| panic!("test config is valid: {e}"))
}

/// A builder pre-seeded with the test defaults.
#[must_use]
pub fn test_config_builder() -> crate::config::RunConfigBuilder {
    RunConfig::builder()
        .retry(RetryPolicy::immediate())
        .invocation_timeout(Duration::from_secs(5))
}

/// A roster of static debaters, judges proposing HOLD, and a static trader.
#[must_use]
pub fn test_roster() -> Roster {
    RoleId::ALL
        .into_iter()
        .fold(Roster::new(), |roster, role| {
            roster.with_role(role, Arc::new(StaticDebater::new(role.as_str())))
        })
        .with_judge(DebateKind::Research, Arc::new(StaticJudge::new("BUY")))
        .with_judge(DebateKind::Risk, Arc::new(StaticJudge::new("HOLD")))
        .with_trader(Arc::new(StaticTrader::new("accumulate on dips")))
}

/// A pipeline with every seat bound to a static mock, overridable per seat.
#[derive(Debug)]
pub struct TestPipeline {
    analysts: Vec<(StageId, Arc<dyn AnalystCapability>, Vec<StageId>)>,
    roster: Roster,
    sink: Option<Arc<dyn EventSink>>,
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPipeline {
    /// Binds all four analysts to static reports.
    #[must_use]
    pub fn new() -> Self {
        let analysts = StageId::ALL
            .into_iter()
            .map(|stage| {
                let capability: Arc<dyn AnalystCapability> =
                    Arc::new(StaticAnalyst::new(format!("{stage} report")));
                (stage, capability, Vec::new())
            })
            .collect();
        Self {
            analysts,
            roster: test_roster(),
            sink: None,
        }
    }

    /// Replaces the capability of one analyst.
    #[must_use]
    pub fn with_analyst(mut self, stage: StageId, capability: Arc<dyn AnalystCapability>) -> Self {
        self.analysts.retain(|(s, _, _)| *s != stage);
        self.analysts.push((stage, capability, Vec::new()));
        self
    }

    /// Replaces one analyst and declares its dependencies.
    #[must_use]
    pub fn with_dependent_analyst(
        mut self,
        stage: StageId,
        capability: Arc<dyn AnalystCapability>,
        dependencies: &[StageId],
    ) -> Self {
        self.analysts.retain(|(s, _, _)| *s != stage);
        self.analysts.push((stage, capability, dependencies.to_vec()));
        self
    }

    /// Replaces one debater.
    #[must_use]
    pub fn with_debater(mut self, role: RoleId, capability: Arc<dyn DebateRoleCapability>) -> Self {
        self.roster = self.roster.with_role(role, capability);
        self
    }

    /// Replaces one judge.
    #[must_use]
    pub fn with_judge(mut self, debate: DebateKind, capability: Arc<dyn SynthesisCapability>) -> Self {
        self.roster = self.roster.with_judge(debate, capability);
        self
    }

    /// Replaces the trader.
    #[must_use]
    pub fn with_trader(mut self, capability: Arc<dyn TraderCapability>) -> Self {
        self.roster = self.roster.with_trader(capability);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let mut builder = Pipeline::builder().roster(self.roster);
        for (stage, capability, dependencies) in self.analysts {
            builder = builder.analyst_with_dependencies(stage, capability, &dependencies);
        }
        if let Some(sink) = self.sink {
            builder = builder.event_sink(sink);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_fast() {
        let config = test_config();
        assert_eq!(config.invocation_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry().base_delay_ms, 0);
        assert_eq!(config.retry().max_attempts, 2);
    }

    #[test]
    fn test_roster_is_complete() {
        assert!(test_roster().validate().is_ok());
    }

    #[test]
    fn test_pipeline_builds() {
        let pipeline = TestPipeline::new()
            .with_analyst(StageId::News, Arc::new(StaticAnalyst::new("other")))
            .build()
            .unwrap();
        assert_eq!(pipeline.registry().len(), 4);
    }
}
