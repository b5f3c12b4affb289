//! Pipeline building and execution.
//!
//! This module provides:
//! - [`PipelineBuilder`] validating capability bindings
//! - batch ([`Pipeline::run`]) and streaming ([`Pipeline::run_streaming`]) execution
//! - the retry and timeout policy applied to every capability call
//!
//! A run moves through the analyst stages, the research debate, the trader,
//! the risk debate and finally the sealed verdict. Both execution modes
//! drive the same state machine, so they produce identical states.

mod builder;
mod driver;
mod retry;
mod sequencer;
mod stream;


pub use builder::PipelineBuilder;
pub use retry::{invoke_with_policy, BackoffStrategy, JitterStrategy, RetryPolicy};
pub use stream::RunStream;

use crate::config::{parse_trade_date, validate_ticker, RunConfig};
use crate::errors::{ConfigError, TradeflowError};
use crate::events::EventSink;
use crate::inspect::{results_path, save_state};
use crate::observability::emit_run_summary;
use crate::registry::{Roster, StageRegistry};
use crate::state::{RunState, StateHandle};
use driver::RunDriver;
use std::sync::Arc;
use std::time::Instant;

/// A validated set of capability bindings that can execute runs.
///
/// Cheap to clone; runs share the bindings but never state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<StageRegistry>,
    roster: Arc<Roster>,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Returns the roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Runs to completion and returns the sealed state.
    ///
    /// When the config names a results directory the final state is also
    /// written to `<dir>/<TICKER>/<DATE>/run_state.json`. A failed write is
    /// logged and the sealed state is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`TradeflowError::Config`] before anything runs if the inputs
    /// are invalid, and [`TradeflowError::Aborted`] if the engine detected an
    /// internal inconsistency.
    pub async fn run(
        &self,
        config: &RunConfig,
        ticker: &str,
        trade_date: &str,
    ) -> Result<RunState, TradeflowError> {
        let started = Instant::now();
        let stream = self.run_streaming(config, ticker, trade_date)?;
        let outcome = stream.finish().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let state = match outcome {
            Ok(state) => state,
            Err(err) => {
                if let TradeflowError::Aborted { state, .. } = &err {
                    emit_run_summary(state, elapsed_ms);
                }
                return Err(err);
            }
        };
        emit_run_summary(&state, elapsed_ms);

        if let Some(dir) = config.results_dir() {
            let path = results_path(dir, state.ticker(), state.trade_date());
            match save_state(&state, &path) {
                Ok(()) => tracing::info!(path = %path.display(), "Final state saved"),
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to save final state"
                ),
            }
        }
        Ok(state)
    }

    /// Starts a run and returns its lazy event stream.
    ///
    /// Validation happens here; no capability is called until the stream is
    /// polled.
    pub fn run_streaming(
        &self,
        config: &RunConfig,
        ticker: &str,
        trade_date: &str,
    ) -> Result<RunStream, TradeflowError> {
        let ticker = validate_ticker(ticker)?;
        let trade_date = parse_trade_date(trade_date)?;
        if let Some(stage) = config
            .active_stages()
            .iter()
            .find(|s| !self.registry.is_registered(**s))
        {
            return Err(ConfigError::UnregisteredStage(*stage).into());
        }

        let state = RunState::new(ticker, trade_date, config.clone());
        tracing::info!(
            run_id = %state.run_id(),
            ticker = %state.ticker(),
            trade_date = %state.trade_date(),
            provider = %config.provider(),
            stages = config.active_stages().len(),
            "Run started"
        );

        let driver = RunDriver::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.roster),
            Arc::clone(&self.sink),
            StateHandle::new(state),
        );
        Ok(RunStream::new(driver))
    }
}
