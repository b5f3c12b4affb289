//! # Tradeflow
//!
//! An orchestration engine for multi-stage trading decisions.
//!
//! A run takes a ticker and a trade date through a fixed sequence:
//!
//! - **Analyst stages**: independent reports (market, social, news,
//!   fundamentals), optionally ordered by declared dependencies
//! - **Research debate**: bull and bear argue in alternating rounds, then a
//!   judge synthesizes an investment judgment
//! - **Trader**: drafts a plan from the judgment
//! - **Risk debate**: aggressive and conservative voices argue over the plan
//! - **Verdict**: the risk judgment becomes the sealed final decision
//!
//! Every model, tool and data source is an injected capability; the engine
//! owns sequencing, state, retries and inspection. Failing capabilities
//! degrade a run instead of aborting it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tradeflow::prelude::*;
//!
//! let pipeline = Pipeline::builder()
//!     .analyst(StageId::Market, Arc::new(MarketAnalyst::new(client)))
//!     .roster(roster)
//!     .build()?;
//!
//! // Batch
//! let state = pipeline.run(&RunConfig::default(), "AAPL", "2024-01-15").await?;
//! println!("{}", state.final_verdict().unwrap().decision);
//!
//! // Streaming
//! let mut events = pipeline.run_streaming(&config, "AAPL", "2024-01-15")?;
//! while let Some(event) = events.next().await {
//!     println!("{}", event.to_json()?);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod capabilities;
pub mod config;
pub mod core;
pub mod debate;
pub mod errors;
pub mod events;
pub mod inspect;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod signal;
pub mod state;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::capabilities::{
        AnalystCapability, DebateRoleCapability, FnAnalyst, FnDebater, FnSynthesis, FnTrader,
        SynthesisCapability, TraderCapability,
    };
    pub use crate::config::{Provider, RunConfig, RunConfigBuilder};
    pub use crate::core::{DebateKind, Decision, ModelTier, RoleId, StageId, StageStatus};
    pub use crate::errors::{CapabilityFailure, ConfigError, TradeflowError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RunEvent, RunEventKind,
    };
    pub use crate::inspect::{diff, fingerprint, load_state, save_state, summarize};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RetryPolicy, RunStream};
    pub use crate::registry::{Roster, StageRegistry};
    pub use crate::state::{DebateRecord, DebateTurn, FinalVerdict, Judgment, RunState, StageResult};
}
