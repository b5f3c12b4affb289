//! Core domain model types for tradeflow.
//!
//! This module contains the closed identifier sets and status enums used
//! throughout the engine:
//! - Analyst stage, debate role and debate identifiers
//! - Stage, debate and decision status values

mod ids;
mod status;

pub use ids::{DebateKind, ModelTier, RoleId, Side, StageId};
pub use status::{Decision, DebateStatus, StageStatus};
