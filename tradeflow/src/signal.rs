//! Decision extraction from the final verdict payload.
//!
//! Judges are free-form; the decision label is read from the payload text.
//! An explicit `FINAL TRANSACTION PROPOSAL: BUY|SELL|HOLD` wins, the last
//! one if there are several. Otherwise a `decision` field on an object
//! payload is used, then the last upper-case BUY/SELL/HOLD token.

use crate::core::Decision;
use regex::Regex;
use std::sync::LazyLock;

static PROPOSAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)final\s+transaction\s+proposal\s*:\s*[*_`\s]*(buy|sell|hold)\b")
        .unwrap_or_else(|e| panic!("invalid proposal pattern: {e}"))
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(BUY|SELL|HOLD)\b").unwrap_or_else(|e| panic!("invalid token pattern: {e}"))
});

fn parse_label(label: &str) -> Decision {
    match label.trim().to_ascii_uppercase().as_str() {
        "BUY" => Decision::Buy,
        "SELL" => Decision::Sell,
        "HOLD" => Decision::Hold,
        _ => Decision::Undetermined,
    }
}

fn payload_text(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads the decision label from a free-form text.
#[must_use]
pub fn extract_from_text(text: &str) -> Decision {
    if let Some(caps) = PROPOSAL.captures_iter(text).last() {
        return parse_label(&caps[1]);
    }
    TOKEN
        .captures_iter(text)
        .last()
        .map_or(Decision::Undetermined, |caps| parse_label(&caps[1]))
}

/// Reads the decision label from a verdict payload.
#[must_use]
pub fn extract_decision(payload: &serde_json::Value) -> Decision {
    let text = payload_text(payload);
    if let Some(caps) = PROPOSAL.captures_iter(&text).last() {
        return parse_label(&caps[1]);
    }

    if let Some(label) = payload.get("decision").and_then(serde_json::Value::as_str) {
        let decision = parse_label(label);
        if decision != Decision::Undetermined {
            return decision;
        }
    }

    extract_from_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_proposal() {
        let payload = json!("After weighing both sides... FINAL TRANSACTION PROPOSAL: **BUY**");
        assert_eq!(extract_decision(&payload), Decision::Buy);
    }

    #[test]
    fn test_last_proposal_wins() {
        let text = "Earlier draft: FINAL TRANSACTION PROPOSAL: BUY. Revised: final transaction proposal: sell";
        assert_eq!(extract_from_text(text), Decision::Sell);
    }

    #[test]
    fn test_decision_field() {
        let payload = json!({"decision": "hold", "rationale": "wait for earnings"});
        assert_eq!(extract_decision(&payload), Decision::Hold);
    }

    #[test]
    fn test_bare_token_fallback() {
        assert_eq!(
            extract_from_text("We could BUY here but on balance we HOLD."),
            Decision::Hold
        );
        assert_eq!(
            extract_from_text("hold your horses, nothing decided"),
            Decision::Undetermined
        );
    }

    #[test]
    fn test_null_payload_undetermined() {
        assert_eq!(extract_decision(&serde_json::Value::Null), Decision::Undetermined);
    }
}
