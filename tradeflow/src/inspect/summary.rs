//! Human-readable state summaries.

use crate::state::RunState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Preview length, in characters, before truncation.
pub const PREVIEW_CHARS: usize = 100;

/// One row of a state summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSummary {
    /// Top-level field name.
    pub field: String,
    /// JSON kind of the value (`string`, `object`, `array`, ...).
    pub kind: String,
    /// Compact rendering, cut at [`PREVIEW_CHARS`] with a trailing `...`.
    pub preview: String,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() > PREVIEW_CHARS {
        let cut: String = rendered.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        rendered
    }
}

/// Summarizes every top-level field of the state.
#[must_use]
pub fn summarize(state: &RunState) -> Vec<FieldSummary> {
    let Ok(Value::Object(fields)) = serde_json::to_value(state) else {
        return Vec::new();
    };
    fields
        .iter()
        .map(|(field, value)| FieldSummary {
            field: field.clone(),
            kind: kind_of(value).to_string(),
            preview: preview(value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use crate::state::StageResult;
    use crate::testing::test_config;
    use chrono::NaiveDate;

    #[test]
    fn test_summary_rows() {
        let mut state = RunState::new(
            "AMD",
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            test_config(),
        );
        state
            .insert_stage_result(StageResult::ok(StageId::Market, serde_json::json!("x".repeat(300))))
            .unwrap();

        let rows = summarize(&state);
        let ticker = rows.iter().find(|r| r.field == "ticker").unwrap();
        assert_eq!(ticker.kind, "string");
        assert_eq!(ticker.preview, "AMD");

        let results = rows.iter().find(|r| r.field == "stage_results").unwrap();
        assert_eq!(results.kind, "array");
        assert!(results.preview.ends_with("..."));
        assert_eq!(results.preview.chars().count(), PREVIEW_CHARS + 3);

        let verdict = rows.iter().find(|r| r.field == "final_verdict").unwrap();
        assert_eq!(verdict.kind, "null");
        assert!(rows.iter().any(|r| r.field == "step_counter"));
    }
}
