//! Capability traits invoked by the engine.
//!
//! The engine never looks inside what a capability computes. Analysts,
//! debaters, judges and the trader are opaque async calls returning a JSON
//! payload or an error; the engine only decides when to call them, with what
//! context, and what to record when they fail.

use crate::config::RunConfig;
use crate::core::ModelTier;
use crate::state::{DebateTurn, Judgment, RunState};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

/// Produces one analyst report.
#[async_trait]
pub trait AnalystCapability: Send + Sync + Debug {
    /// Analyzes `ticker` as of `trade_date`.
    ///
    /// `state` is a snapshot taken when the stage was launched; it contains
    /// the results of every declared dependency.
    async fn analyze(
        &self,
        ticker: &str,
        trade_date: NaiveDate,
        config: &RunConfig,
        state: &RunState,
    ) -> anyhow::Result<serde_json::Value>;

    /// The model tier this capability should run on.
    fn model_tier(&self) -> ModelTier {
        ModelTier::Quick
    }
}

/// Speaks one turn of a debate.
#[async_trait]
pub trait DebateRoleCapability: Send + Sync + Debug {
    /// Produces the next utterance given every prior turn and the debate seed.
    async fn speak(
        &self,
        history: &[DebateTurn],
        seed: &serde_json::Value,
        config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value>;

    /// The model tier this capability should run on.
    fn model_tier(&self) -> ModelTier {
        ModelTier::Quick
    }
}

/// Turns a finished debate into a judgment.
#[async_trait]
pub trait SynthesisCapability: Send + Sync + Debug {
    /// Synthesizes the full turn history, called once per debate.
    async fn synthesize(&self, history: &[DebateTurn]) -> anyhow::Result<serde_json::Value>;

    /// The model tier this capability should run on.
    fn model_tier(&self) -> ModelTier {
        ModelTier::Deep
    }
}

/// Drafts the trade plan from the research judgment.
#[async_trait]
pub trait TraderCapability: Send + Sync + Debug {
    /// Drafts a plan. `judgment` may be degraded.
    async fn draft_plan(
        &self,
        judgment: &Judgment,
        state: &RunState,
        config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value>;

    /// The model tier this capability should run on.
    fn model_tier(&self) -> ModelTier {
        ModelTier::Quick
    }
}

/// An analyst backed by a closure.
pub struct FnAnalyst<F>
where
    F: Fn(&str, NaiveDate, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnAnalyst<F>
where
    F: Fn(&str, NaiveDate, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    /// Creates a new closure-backed analyst.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnAnalyst<F>
where
    F: Fn(&str, NaiveDate, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAnalyst").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> AnalystCapability for FnAnalyst<F>
where
    F: Fn(&str, NaiveDate, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    async fn analyze(
        &self,
        ticker: &str,
        trade_date: NaiveDate,
        _config: &RunConfig,
        state: &RunState,
    ) -> anyhow::Result<serde_json::Value> {
        (self.func)(ticker, trade_date, state)
    }
}

/// A debater backed by a closure.
pub struct FnDebater<F>
where
    F: Fn(&[DebateTurn], &serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnDebater<F>
where
    F: Fn(&[DebateTurn], &serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    /// Creates a new closure-backed debater.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnDebater<F>
where
    F: Fn(&[DebateTurn], &serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDebater").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> DebateRoleCapability for FnDebater<F>
where
    F: Fn(&[DebateTurn], &serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    async fn speak(
        &self,
        history: &[DebateTurn],
        seed: &serde_json::Value,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        (self.func)(history, seed)
    }
}

/// A judge backed by a closure.
pub struct FnSynthesis<F>
where
    F: Fn(&[DebateTurn]) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnSynthesis<F>
where
    F: Fn(&[DebateTurn]) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    /// Creates a new closure-backed judge.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnSynthesis<F>
where
    F: Fn(&[DebateTurn]) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSynthesis").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> SynthesisCapability for FnSynthesis<F>
where
    F: Fn(&[DebateTurn]) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    async fn synthesize(&self, history: &[DebateTurn]) -> anyhow::Result<serde_json::Value> {
        (self.func)(history)
    }
}

/// A trader backed by a closure.
pub struct FnTrader<F>
where
    F: Fn(&Judgment, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnTrader<F>
where
    F: Fn(&Judgment, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    /// Creates a new closure-backed trader.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnTrader<F>
where
    F: Fn(&Judgment, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTrader").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> TraderCapability for FnTrader<F>
where
    F: Fn(&Judgment, &RunState) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    async fn draft_plan(
        &self,
        judgment: &Judgment,
        state: &RunState,
        _config: &RunConfig,
    ) -> anyhow::Result<serde_json::Value> {
        (self.func)(judgment, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RunState {
        RunState::new(
            "NVDA",
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            RunConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_fn_analyst() {
        let analyst = FnAnalyst::new("market", |ticker, date, _state| {
            Ok(serde_json::json!(format!("{ticker} on {date}")))
        });
        let report = analyst
            .analyze("NVDA", state().trade_date(), &RunConfig::default(), &state())
            .await
            .unwrap();
        assert_eq!(report, serde_json::json!("NVDA on 2024-05-02"));
        assert_eq!(analyst.model_tier(), ModelTier::Quick);
        assert!(format!("{analyst:?}").contains("market"));
    }

    #[tokio::test]
    async fn test_fn_debater_sees_history() {
        let debater = FnDebater::new("bull", |history, seed| {
            Ok(serde_json::json!({"heard": history.len(), "seed": seed}))
        });
        let out = debater
            .speak(&[], &serde_json::json!("s"), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(out["heard"], 0);
        assert_eq!(out["seed"], "s");
    }

    #[tokio::test]
    async fn test_fn_synthesis_defaults_to_deep_tier() {
        let judge = FnSynthesis::new("judge", |_history| anyhow::bail!("no quorum"));
        assert_eq!(judge.model_tier(), ModelTier::Deep);
        assert!(judge.synthesize(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fn_trader() {
        let trader = FnTrader::new("trader", |judgment, _state| Ok(judgment.payload.clone()));
        let plan = trader
            .draft_plan(
                &Judgment::synthesized(serde_json::json!("BUY")),
                &state(),
                &RunConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(plan, serde_json::json!("BUY"));
    }
}
