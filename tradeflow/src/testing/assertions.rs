//! Test assertions for run states and debates.

use crate::core::{DebateKind, StageId, StageStatus};
use crate::state::{DebateRecord, RunState};

/// Asserts that turns alternate A, B, A, ... starting with side A, with the
/// round advancing after each B turn.
pub fn assert_alternating_turns(record: &DebateRecord) {
    for (i, turn) in record.turns.iter().enumerate() {
        let expected = if i % 2 == 0 { record.role_a } else { record.role_b };
        assert_eq!(
            turn.speaker, expected,
            "Turn {} of the {} debate: expected {}, got {}",
            i, record.kind, expected, turn.speaker
        );
        assert_eq!(
            turn.round as usize,
            i / 2 + 1,
            "Turn {} of the {} debate is in round {}",
            i,
            record.kind,
            turn.round
        );
    }
}

/// Asserts that a stage has a result with the expected status.
pub fn assert_stage_status(state: &RunState, stage: StageId, expected: StageStatus) {
    let result = state
        .stage_result(stage)
        .unwrap_or_else(|| panic!("Expected a result for stage '{stage}', found none"));
    assert_eq!(
        result.status, expected,
        "Expected stage '{}' to be {}, got {}",
        stage, expected, result.status
    );
}

/// Asserts that a debate concluded with `2 * rounds` alternating turns.
pub fn assert_debate_complete(state: &RunState, kind: DebateKind, rounds: u32) {
    let record = state
        .debate(kind)
        .unwrap_or_else(|| panic!("Expected a {kind} debate, found none"));
    assert!(record.is_concluded(), "Expected the {kind} debate to be concluded");
    assert_eq!(
        record.turns.len(),
        rounds as usize * 2,
        "Expected {} turns in the {} debate, got {}",
        rounds * 2,
        kind,
        record.turns.len()
    );
    assert_alternating_turns(record);
}

/// Asserts that the state is sealed with a verdict.
pub fn assert_sealed(state: &RunState) {
    assert!(state.is_sealed(), "Expected a sealed state");
    assert!(
        state.final_verdict().is_some(),
        "Expected a final verdict on a sealed state"
    );
}
