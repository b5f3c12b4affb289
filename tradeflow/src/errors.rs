//! Error types for the tradeflow engine.
//!
//! Only configuration errors and engine invariant violations are fatal to a
//! run. Capability failures and unmet dependencies are recorded in the run
//! state instead of being propagated.

use crate::core::{DebateKind, RoleId, StageId};
use crate::state::RunState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for tradeflow operations.
#[derive(Debug, Error)]
pub enum TradeflowError {
    /// The run configuration, inputs or registry are invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A write was attempted after the final verdict sealed the state.
    #[error("{0}")]
    StateSealed(#[from] StateSealedError),

    /// The engine detected an internal inconsistency.
    #[error("{0}")]
    Invariant(#[from] EngineInvariantViolation),

    /// The run was aborted; the partial state is attached for inspection.
    #[error("Run aborted: {source}")]
    Aborted {
        /// The violation that aborted the run.
        source: EngineInvariantViolation,
        /// The unsealed state at the moment of the abort.
        state: Box<RunState>,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-002-ROUNDS").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Raised when a run configuration or its inputs fail validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A round limit was zero.
    #[error("{field} must be a positive integer, got {value}")]
    InvalidRounds {
        /// The offending field.
        field: &'static str,
        /// The rejected value.
        value: u32,
    },

    /// No analyst stage was selected.
    #[error("active_stages must contain at least one stage")]
    NoActiveStages,

    /// A stage identifier is not part of the registry's closed set.
    #[error("Unknown stage identifier '{0}'")]
    UnknownStage(String),

    /// A provider name is not supported.
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// An active stage has no capability bound in the registry.
    #[error("Stage '{0}' is active but not registered")]
    UnregisteredStage(StageId),

    /// A model identifier was blank.
    #[error("{0} must not be empty")]
    EmptyModel(&'static str),

    /// The invocation timeout was zero.
    #[error("invocation_timeout_ms must be greater than zero")]
    InvalidTimeout,

    /// The retry budget was zero.
    #[error("retry.max_attempts must be at least 1")]
    InvalidRetryBudget,

    /// The ticker symbol is malformed.
    #[error("Invalid ticker symbol '{0}'")]
    InvalidTicker(String),

    /// The trade date is not a `YYYY-MM-DD` calendar date.
    #[error("Invalid trade date '{0}', expected YYYY-MM-DD")]
    InvalidTradeDate(String),

    /// A stage declares a dependency on an unknown stage.
    #[error("Stage '{stage}' depends on unregistered stage '{dependency}'")]
    MissingDependency {
        /// The dependent stage.
        stage: StageId,
        /// The missing dependency.
        dependency: StageId,
    },

    /// Stage dependencies form a cycle.
    #[error("Cycle detected in stage dependencies: {}", format_cycle(.0))]
    DependencyCycle(Vec<StageId>),

    /// A debate role has no capability bound.
    #[error("Debate role '{0}' has no capability bound")]
    MissingRole(RoleId),

    /// A debate has no synthesis capability bound.
    #[error("Debate '{0}' has no synthesis capability bound")]
    MissingSynthesis(DebateKind),

    /// No trader capability was bound.
    #[error("No trader capability bound")]
    MissingTrader,

    /// The configuration document could not be parsed.
    #[error("Malformed configuration: {0}")]
    Malformed(String),

    /// A pipeline was built without any analyst stage.
    #[error("Pipeline has no analyst stages registered")]
    EmptyRegistry,
}

fn format_cycle(path: &[StageId]) -> String {
    path.iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ConfigError {
    /// Returns diagnostic info with a stable error code.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let (code, hint) = match self {
            Self::InvalidRounds { .. } => ("CONFIG-001-ROUNDS", "Use a round limit of 1 or more."),
            Self::NoActiveStages => ("CONFIG-002-EMPTY", "Select at least one analyst stage."),
            Self::UnknownStage(_) => (
                "CONFIG-003-STAGE",
                "Known stages are market, social, news and fundamentals.",
            ),
            Self::UnknownProvider(_) => (
                "CONFIG-004-PROVIDER",
                "Use one of openai, anthropic, google, ollama, openrouter.",
            ),
            Self::UnregisteredStage(_) => (
                "CONFIG-005-UNREGISTERED",
                "Bind an analyst capability for every active stage.",
            ),
            Self::EmptyModel(_) => ("CONFIG-006-MODEL", "Provide a model identifier."),
            Self::InvalidTimeout | Self::InvalidRetryBudget => (
                "CONFIG-007-INVOCATION",
                "Timeouts and retry budgets must be positive.",
            ),
            Self::InvalidTicker(_) | Self::InvalidTradeDate(_) => (
                "CONFIG-008-INPUT",
                "Tickers are 1-10 letters, dots or dashes; dates are YYYY-MM-DD.",
            ),
            Self::MissingDependency { .. } => (
                "CONFIG-009-MISSING_DEP",
                "Register the dependency before the stage that depends on it.",
            ),
            Self::DependencyCycle(_) => (
                "CONFIG-010-CYCLE",
                "Remove one of the dependencies in the cycle to break it.",
            ),
            Self::MissingRole(_) | Self::MissingSynthesis(_) | Self::MissingTrader => (
                "CONFIG-011-ROSTER",
                "Bind all four debate roles, both judges and the trader.",
            ),
            Self::Malformed(_) => ("CONFIG-012-MALFORMED", "Check the configuration document."),
            Self::EmptyRegistry => (
                "CONFIG-013-EMPTY_REGISTRY",
                "Register at least one analyst stage before building.",
            ),
        };
        ContractErrorInfo::new(code, self.to_string()).with_fix_hint(hint)
    }
}

/// A capability invocation that failed after its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Capability '{capability}' failed after {attempts} attempt(s): {reason}")]
pub struct CapabilityFailure {
    /// The capability label (stage, role, judge or trader).
    pub capability: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// The last failure reason.
    pub reason: String,
    /// Whether the last attempt timed out.
    pub timed_out: bool,
}

impl CapabilityFailure {
    /// Creates a new capability failure.
    #[must_use]
    pub fn new(capability: impl Into<String>, attempts: u32, reason: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            attempts,
            reason: reason.into(),
            timed_out: false,
        }
    }

    /// Marks the failure as caused by a timeout.
    #[must_use]
    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }
}

/// A stage that was skipped because a prerequisite did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency failed: stage '{stage}' requires '{dependency}'")]
pub struct DependencyUnmet {
    /// The skipped stage.
    pub stage: StageId,
    /// The prerequisite that failed or was not active.
    pub dependency: StageId,
}

/// Raised when writing to a state whose final verdict is already set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Run state is sealed; cannot {operation}")]
pub struct StateSealedError {
    /// The rejected operation.
    pub operation: String,
}

impl StateSealedError {
    /// Creates a new sealed-state error.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

/// An internal inconsistency in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Engine invariant violated: {message}")]
pub struct EngineInvariantViolation {
    /// What went wrong.
    pub message: String,
}

impl EngineInvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
