//! Testing utilities for tradeflow pipelines.
//!
//! This module provides:
//! - Mock capabilities (static, failing, flaky, slow, echo)
//! - Fixtures for configs, rosters and whole pipelines
//! - Assertions over run states and debate records

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_alternating_turns, assert_debate_complete, assert_sealed, assert_stage_status,
};
pub use fixtures::{test_config, test_config_builder, test_roster, TestPipeline};
pub use mocks::{
    CountingDebater, EchoAnalyst, FailingAnalyst, FailingDebater, FlakyDebater, SlowAnalyst,
    StaticAnalyst, StaticDebater, StaticJudge, StaticTrader,
};
