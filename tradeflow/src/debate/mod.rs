//! Adversarial debates between two fixed roles.
//!
//! The same engine runs both debates of a run: bull vs bear over the analyst
//! reports, then aggressive vs conservative over the trader's plan. Side A
//! opens every round, side B answers, and a separate judge synthesizes the
//! full history once the round limit is reached.

mod engine;
mod seed;

pub use engine::{run_debate, DebatePhase, DebateSession, DebateStep};
pub use seed::{research_seed, risk_seed};
