//! Pipeline builder with validation.

use super::Pipeline;
use crate::capabilities::{
    AnalystCapability, DebateRoleCapability, SynthesisCapability, TraderCapability,
};
use crate::core::{DebateKind, RoleId, StageId};
use crate::errors::ConfigError;
use crate::events::{EventSink, NoOpEventSink};
use crate::registry::{Roster, StageRegistry};
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    registry: StageRegistry,
    roster: Roster,
    sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an independent analyst stage.
    #[must_use]
    pub fn analyst(mut self, stage: StageId, capability: Arc<dyn AnalystCapability>) -> Self {
        self.registry = self.registry.register(stage, capability);
        self
    }

    /// Binds an analyst stage that runs after `dependencies` succeed.
    #[must_use]
    pub fn analyst_with_dependencies(
        mut self,
        stage: StageId,
        capability: Arc<dyn AnalystCapability>,
        dependencies: &[StageId],
    ) -> Self {
        self.registry = self.registry.register_with_dependencies(
            stage,
            capability,
            dependencies.iter().copied(),
        );
        self
    }

    /// Replaces the whole stage registry.
    #[must_use]
    pub fn registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Binds a debate role.
    #[must_use]
    pub fn debater(mut self, role: RoleId, capability: Arc<dyn DebateRoleCapability>) -> Self {
        self.roster = self.roster.with_role(role, capability);
        self
    }

    /// Binds the judge of a debate.
    #[must_use]
    pub fn judge(mut self, debate: DebateKind, capability: Arc<dyn SynthesisCapability>) -> Self {
        self.roster = self.roster.with_judge(debate, capability);
        self
    }

    /// Binds the trader.
    #[must_use]
    pub fn trader(mut self, capability: Arc<dyn TraderCapability>) -> Self {
        self.roster = self.roster.with_trader(capability);
        self
    }

    /// Replaces the whole roster.
    #[must_use]
    pub fn roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    /// Sets the sink receiving every run event.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the bindings and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if no analyst is registered, a dependency is unknown
    /// or cyclic, or a debate seat, judge or the trader is unbound.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        if self.registry.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        self.registry.validate()?;
        self.roster.validate()?;

        tracing::debug!(stages = self.registry.len(), "Pipeline built");
        Ok(Pipeline {
            registry: Arc::new(self.registry),
            roster: Arc::new(self.roster),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
        })
    }
}
