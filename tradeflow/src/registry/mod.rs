//! Capability bindings for analyst stages, debate roles, judges and the trader.
//!
//! The identifier sets are closed; the registry only decides which
//! capability answers for each identifier and which analyst stages depend on
//! which.

use crate::capabilities::{
    AnalystCapability, DebateRoleCapability, SynthesisCapability, TraderCapability,
};
use crate::core::{DebateKind, RoleId, StageId};
use crate::errors::ConfigError;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// One registered analyst stage.
#[derive(Debug, Clone)]
pub struct StageEntry {
    /// The capability invoked for the stage.
    pub capability: Arc<dyn AnalystCapability>,
    /// Stages that must succeed before this one runs.
    pub dependencies: BTreeSet<StageId>,
}

/// Declares the available analyst stages and their dependency edges.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    entries: BTreeMap<StageId, StageEntry>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an independent stage, replacing any previous binding.
    #[must_use]
    pub fn register(self, stage: StageId, capability: Arc<dyn AnalystCapability>) -> Self {
        self.register_with_dependencies(stage, capability, [])
    }

    /// Registers a stage that runs only after `dependencies` succeed.
    #[must_use]
    pub fn register_with_dependencies(
        mut self,
        stage: StageId,
        capability: Arc<dyn AnalystCapability>,
        dependencies: impl IntoIterator<Item = StageId>,
    ) -> Self {
        self.entries.insert(
            stage,
            StageEntry {
                capability,
                dependencies: dependencies.into_iter().collect(),
            },
        );
        self
    }

    /// Returns the entry for a stage.
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&StageEntry> {
        self.entries.get(&stage)
    }

    /// Returns true if the stage has a capability bound.
    #[must_use]
    pub fn is_registered(&self, stage: StageId) -> bool {
        self.entries.contains_key(&stage)
    }

    /// Returns the declared dependencies of a stage.
    #[must_use]
    pub fn dependencies(&self, stage: StageId) -> BTreeSet<StageId> {
        self.entries
            .get(&stage)
            .map(|e| e.dependencies.clone())
            .unwrap_or_default()
    }

    /// Returns the registered stages in canonical order.
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.entries.keys().copied()
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates the dependency graph.
    ///
    /// Every dependency must be registered and the graph must be acyclic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (stage, entry) in &self.entries {
            for dep in &entry.dependencies {
                if !self.entries.contains_key(dep) {
                    return Err(ConfigError::MissingDependency {
                        stage: *stage,
                        dependency: *dep,
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for stage in self.entries.keys() {
            if !visited.contains(stage) {
                if let Some(cycle) = self.dfs_cycle(*stage, &mut visited, &mut rec_stack, &mut path) {
                    return Err(ConfigError::DependencyCycle(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: StageId,
        visited: &mut HashSet<StageId>,
        rec_stack: &mut HashSet<StageId>,
        path: &mut Vec<StageId>,
    ) -> Option<Vec<StageId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(entry) = self.entries.get(&node) {
            for dep in &entry.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(*dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(*dep);
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(&node);
        None
    }
}

/// Binds the debate roles, the two judges and the trader.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    roles: HashMap<RoleId, Arc<dyn DebateRoleCapability>>,
    judges: HashMap<DebateKind, Arc<dyn SynthesisCapability>>,
    trader: Option<Arc<dyn TraderCapability>>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a debate role.
    #[must_use]
    pub fn with_role(mut self, role: RoleId, capability: Arc<dyn DebateRoleCapability>) -> Self {
        self.roles.insert(role, capability);
        self
    }

    /// Binds the synthesis judge of a debate.
    #[must_use]
    pub fn with_judge(mut self, debate: DebateKind, capability: Arc<dyn SynthesisCapability>) -> Self {
        self.judges.insert(debate, capability);
        self
    }

    /// Binds the trader.
    #[must_use]
    pub fn with_trader(mut self, capability: Arc<dyn TraderCapability>) -> Self {
        self.trader = Some(capability);
        self
    }

    /// Returns the capability for a role.
    pub fn role(&self, role: RoleId) -> Result<Arc<dyn DebateRoleCapability>, ConfigError> {
        self.roles
            .get(&role)
            .cloned()
            .ok_or(ConfigError::MissingRole(role))
    }

    /// Returns the judge for a debate.
    pub fn judge(&self, debate: DebateKind) -> Result<Arc<dyn SynthesisCapability>, ConfigError> {
        self.judges
            .get(&debate)
            .cloned()
            .ok_or(ConfigError::MissingSynthesis(debate))
    }

    /// Returns the trader.
    pub fn trader(&self) -> Result<Arc<dyn TraderCapability>, ConfigError> {
        self.trader.clone().ok_or(ConfigError::MissingTrader)
    }

    /// Checks that every seat is filled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in RoleId::ALL {
            self.role(role)?;
        }
        for debate in DebateKind::ALL {
            self.judge(debate)?;
        }
        self.trader().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::FnAnalyst;
    use crate::testing::{StaticDebater, StaticJudge, StaticTrader};

    fn analyst() -> Arc<dyn AnalystCapability> {
        Arc::new(FnAnalyst::new("noop", |_, _, _| Ok(serde_json::Value::Null)))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = StageRegistry::new()
            .register(StageId::Market, analyst())
            .register_with_dependencies(StageId::Fundamentals, analyst(), [StageId::Market]);

        assert_eq!(registry.len(), 2);
        assert!(registry.is_registered(StageId::Market));
        assert!(!registry.is_registered(StageId::News));
        assert_eq!(
            registry.dependencies(StageId::Fundamentals),
            BTreeSet::from([StageId::Market])
        );
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_stages_in_canonical_order() {
        let registry = StageRegistry::new()
            .register(StageId::Fundamentals, analyst())
            .register(StageId::Market, analyst());
        let stages: Vec<_> = registry.stages().collect();
        assert_eq!(stages, vec![StageId::Market, StageId::Fundamentals]);
    }

    #[test]
    fn test_missing_dependency() {
        let registry = StageRegistry::new().register_with_dependencies(
            StageId::News,
            analyst(),
            [StageId::Social],
        );
        assert_eq!(
            registry.validate().unwrap_err(),
            ConfigError::MissingDependency {
                stage: StageId::News,
                dependency: StageId::Social,
            }
        );
    }

    #[test]
    fn test_cycle_detected() {
        let registry = StageRegistry::new()
            .register_with_dependencies(StageId::Market, analyst(), [StageId::News])
            .register_with_dependencies(StageId::News, analyst(), [StageId::Market]);

        match registry.validate().unwrap_err() {
            ConfigError::DependencyCycle(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&StageId::Market));
                assert!(cycle.contains(&StageId::News));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let registry =
            StageRegistry::new().register_with_dependencies(StageId::Social, analyst(), [StageId::Social]);
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_roster_validation() {
        let roster = Roster::new()
            .with_role(RoleId::Bull, Arc::new(StaticDebater::new("bull")))
            .with_role(RoleId::Bear, Arc::new(StaticDebater::new("bear")));
        assert_eq!(
            roster.validate().unwrap_err(),
            ConfigError::MissingRole(RoleId::Aggressive)
        );

        let roster = roster
            .with_role(RoleId::Aggressive, Arc::new(StaticDebater::new("aggressive")))
            .with_role(RoleId::Conservative, Arc::new(StaticDebater::new("conservative")))
            .with_judge(DebateKind::Research, Arc::new(StaticJudge::new("HOLD")));
        assert_eq!(
            roster.validate().unwrap_err(),
            ConfigError::MissingSynthesis(DebateKind::Risk)
        );

        let roster = roster
            .with_judge(DebateKind::Risk, Arc::new(StaticJudge::new("HOLD")))
            .with_trader(Arc::new(StaticTrader::new("plan")));
        assert!(roster.validate().is_ok());
    }
}
