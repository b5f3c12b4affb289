//! Mock capabilities for testing.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::capabilities::{
    AnalystCapability, DebateRoleCapability, SynthesisCapability, TraderCapability,
};
use crate::config::RunConfig;
use crate::state::{DebateTurn, Judgment, RunState};

/// An analyst that always returns the same report.
#[derive(Debug)]
pub struct StaticAnalyst {
    report: serde_json::Value,
    calls: AtomicUsize,
}

impl StaticAnalyst {
    /// Creates an analyst returning `report` as a JSON string.
    #[must_use]
    pub fn new(report: impl Into<String>) -> Self {
        Self::with_report(serde_json::Value::String(report.into()))
    }

    /// Creates an analyst returning an arbitrary payload.
    #[must_use]
    pub fn with_report(report: serde_json::Value) -> Self {
        Self {
            report,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the analyst was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalystCapability for StaticAnalyst {
    async fn analyze(
        &self,
        _ticker: &str,
        _trade_date: NaiveDate,
        _config: &RunConfig,
        _state: &RunState,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}

/// An analyst that always fails.
#[derive(Debug)]
pub struct FailingAnalyst {
    error: String,
    calls: AtomicUsize,
}

impl FailingAnalyst {
    /// Creates a failing analyst.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the analyst was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalystCapability for FailingAnalyst {
    async fn analyze(
        &self,
        _ticker: &str,
        _trade_date: NaiveDate,
        _config: &RunConfig,
        _state: &RunState,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("{}", self.error)
    }
}

/// An analyst that sleeps before reporting.
#[derive(Debug)]
pub struct SlowAnalyst {
    delay: Duration,
    report: serde_json::Value,
}

impl SlowAnalyst {
    /// Creates an analyst that answers after `delay`.
    #[must_use]
    pub fn new(delay: Duration, report: impl Into<String>) -> Self {
        Self {
            delay,
            report: serde_json::Value::String(report.into()),
        }
    }
}

#[async_trait]
impl AnalystCapability for SlowAnalyst {
    async fn analyze(
        &self,
        _ticker: &str,
        _trade_date: NaiveDate,
        _config: &RunConfig,
        _state: &RunState,
    ) -> anyhow::Result<serde_json::Value> {
        tokio::time::sleep(self.delay).await;
        Ok(self.report.clone())
    }
}

/// An analyst that reports which dependency reports it could see.
#[derive(Debug, Default)]
pub struct EchoAnalyst;

#[async_trait]
impl AnalystCapability for EchoAnalyst {
    async fn analyze(
        &self,
        ticker: &str,
        trade_date: NaiveDate,
        config: &RunConfig,
        state: &RunState,
    ) -> anyhow::Result<serde_json::Value> {
        let seen: Vec<_> = state
            .stage_results()
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.stage.as_str())
            .collect();
        Ok(serde_json::json!({
            "ticker": ticker,
            "trade_date": trade_date.to_string(),
            "online_tools": config.online_tools(),
            "seen": seen,
        }))
    }
}

/// A debater that numbers its arguments.
#[derive(Debug)]
pub struct StaticDebater {
    name: String,
}

impl StaticDebater {
    /// Creates a debater speaking as `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DebateRoleCapability for StaticDebater {
    async fn speak(
        &self,
        history: &[DebateTurn],
        _seed: &serde_json::Value,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!(format!("{} argument #{}", self.name, history.len() + 1)))
    }
}

/// A debater that records how much history it was given.
#[derive(Debug, Default)]
pub struct CountingDebater {
    seen: Mutex<Vec<usize>>,
}

impl CountingDebater {
    /// Creates a counting debater.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the history length seen on each call.
    #[must_use]
    pub fn seen_history_lengths(&self) -> Vec<usize> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl DebateRoleCapability for CountingDebater {
    async fn speak(
        &self,
        history: &[DebateTurn],
        _seed: &serde_json::Value,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        self.seen.lock().push(history.len());
        Ok(serde_json::json!({"heard": history.len()}))
    }
}

/// A debater that always fails.
#[derive(Debug)]
pub struct FailingDebater {
    error: String,
}

impl FailingDebater {
    /// Creates a failing debater.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl DebateRoleCapability for FailingDebater {
    async fn speak(
        &self,
        _history: &[DebateTurn],
        _seed: &serde_json::Value,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        anyhow::bail!("{}", self.error)
    }
}

/// A debater that fails its first `failures` calls, then succeeds.
#[derive(Debug)]
pub struct FlakyDebater {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyDebater {
    /// Creates a flaky debater.
    #[must_use]
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DebateRoleCapability for FlakyDebater {
    async fn speak(
        &self,
        history: &[DebateTurn],
        _seed: &serde_json::Value,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("transient failure #{}", call + 1);
        }
        Ok(serde_json::json!(format!("recovered after {} prior turns", history.len())))
    }
}

/// A judge that ends with a fixed transaction proposal.
#[derive(Debug)]
pub struct StaticJudge {
    decision: Option<String>,
    calls: AtomicUsize,
}

impl StaticJudge {
    /// Creates a judge proposing `decision` (e.g. `"BUY"`).
    #[must_use]
    pub fn new(decision: impl Into<String>) -> Self {
        Self {
            decision: Some(decision.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a judge that always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            decision: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the judge was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisCapability for StaticJudge {
    async fn synthesize(&self, history: &[DebateTurn]) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.decision {
            Some(decision) => Ok(serde_json::json!(format!(
                "Weighed {} turns. FINAL TRANSACTION PROPOSAL: **{decision}**",
                history.len()
            ))),
            None => anyhow::bail!("judge unavailable"),
        }
    }
}

/// A trader that returns a fixed plan.
#[derive(Debug)]
pub struct StaticTrader {
    plan: Option<String>,
    calls: AtomicUsize,
}

impl StaticTrader {
    /// Creates a trader returning `plan`.
    #[must_use]
    pub fn new(plan: impl Into<String>) -> Self {
        Self {
            plan: Some(plan.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a trader that always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            plan: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the trader was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TraderCapability for StaticTrader {
    async fn draft_plan(
        &self,
        judgment: &Judgment,
        _state: &RunState,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            Some(plan) => Ok(serde_json::json!({
                "plan": plan,
                "based_on_degraded_judgment": judgment.degraded,
            })),
            None => anyhow::bail!("trader unavailable"),
        }
    }
}
