//! Field-level diffs between two run states.

use crate::core::DebateKind;
use crate::state::{DebateRecord, RunState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How a field changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the newer state.
    Added,
    /// Present only in the older state.
    Removed,
    /// Present in both with different values.
    Changed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Changed => write!(f, "changed"),
        }
    }
}

/// One entry of a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Step at which the change happened; 0 for run inputs.
    pub step: u64,
    /// Dotted path of the field, e.g. `stage_results.market`.
    pub path: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Value in the older state.
    pub old: Option<Value>,
    /// Value in the newer state.
    pub new: Option<Value>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.step, self.kind, self.path)
    }
}

fn json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Default)]
struct DiffBuilder {
    changes: Vec<Change>,
}

impl DiffBuilder {
    fn push(&mut self, step: u64, path: impl Into<String>, old: Option<Value>, new: Option<Value>) {
        let kind = match (&old, &new) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Removed,
            (Some(a), Some(b)) if a != b => ChangeKind::Changed,
            _ => return,
        };
        self.changes.push(Change {
            step,
            path: path.into(),
            kind,
            old,
            new,
        });
    }

    fn field<T: Serialize + PartialEq>(&mut self, step: u64, path: &str, old: &T, new: &T) {
        if old != new {
            self.push(step, path, Some(json(old)), Some(json(new)));
        }
    }

    /// Diffs an optional record whose write step is read by `step_of`.
    fn optional<T: Serialize + PartialEq>(
        &mut self,
        path: &str,
        old: Option<&T>,
        new: Option<&T>,
        step_of: impl Fn(&T) -> u64,
    ) {
        if old == new {
            return;
        }
        let step = new.or(old).map_or(0, &step_of);
        self.push(step, path, old.map(json), new.map(json));
    }

    fn debate(&mut self, kind: DebateKind, old: Option<&DebateRecord>, new: Option<&DebateRecord>) {
        let base = format!("{kind}_debate");
        let header = |r: &DebateRecord| {
            serde_json::json!({
                "kind": r.kind,
                "role_a": r.role_a,
                "role_b": r.role_b,
                "opened_step": r.opened_step,
            })
        };

        let (old_header, new_header) = (old.map(header), new.map(header));
        if old_header != new_header {
            let step = new.or(old).map_or(0, |r| r.opened_step);
            self.push(step, base.clone(), old_header, new_header);
        }

        let old_turns = old.map(|r| r.turns.as_slice()).unwrap_or_default();
        let new_turns = new.map(|r| r.turns.as_slice()).unwrap_or_default();
        for i in 0..old_turns.len().max(new_turns.len()) {
            let (a, b) = (old_turns.get(i), new_turns.get(i));
            if a == b {
                continue;
            }
            let step = b.or(a).map_or(0, |t| t.step);
            self.push(step, format!("{base}.turns[{i}]"), a.map(json), b.map(json));
        }

        self.optional(
            &format!("{base}.judgment"),
            old.and_then(|r| r.judgment.as_ref()),
            new.and_then(|r| r.judgment.as_ref()),
            |j| j.step,
        );
    }
}

/// Lists every field-level change from `old` to `new`, ordered by step.
///
/// Run inputs (id, ticker, date, config) are reported at step 0. Stage
/// results are keyed by stage, debate turns by position. The step counter
/// itself is the ordering key and never appears as a change; debate
/// `status` and `rounds_completed` follow from turns and judgment and are
/// not reported separately.
#[must_use]
pub fn diff(old: &RunState, new: &RunState) -> Vec<Change> {
    let mut builder = DiffBuilder::default();

    builder.field(0, "run_id", &old.run_id(), &new.run_id());
    builder.field(0, "ticker", &old.ticker(), &new.ticker());
    builder.field(0, "trade_date", &old.trade_date(), &new.trade_date());
    builder.field(0, "config", old.config(), new.config());

    let mut stages: Vec<_> = old
        .stage_results()
        .iter()
        .chain(new.stage_results())
        .map(|r| r.stage)
        .collect();
    stages.sort();
    stages.dedup();
    for stage in stages {
        builder.optional(
            &format!("stage_results.{stage}"),
            old.stage_result(stage),
            new.stage_result(stage),
            |r| r.step,
        );
    }

    for kind in DebateKind::ALL {
        builder.debate(kind, old.debate(kind), new.debate(kind));
    }

    builder.optional("trader_plan", old.trader_plan(), new.trader_plan(), |p| p.step);
    builder.optional("final_verdict", old.final_verdict(), new.final_verdict(), |v| v.step);

    if old.is_sealed() != new.is_sealed() {
        let step = new
            .final_verdict()
            .or(old.final_verdict())
            .map_or(new.step_counter(), |v| v.step);
        builder.push(
            step,
            "sealed",
            Some(Value::Bool(old.is_sealed())),
            Some(Value::Bool(new.is_sealed())),
        );
    }

    builder.optional("failure", old.failure(), new.failure(), |f| f.step);

    let mut changes = builder.changes;
    changes.sort_by_key(|c| c.step);
    changes
}
