//! The state threaded through a run.
//!
//! - [`RunState`]: the record itself, read-only outside the engine
//! - [`StateHandle`]: the single-writer handle the sequencer owns
//! - record types for stage results, debates, the plan and the verdict

mod handle;
mod records;
mod run_state;

pub(crate) use handle::DebateWriter;
pub use handle::StateHandle;
pub use records::{
    DebateRecord, DebateTurn, FailureKind, FailureReason, FinalVerdict, Judgment, RunFailure,
    StageResult, TradePlan,
};
pub use run_state::RunState;
