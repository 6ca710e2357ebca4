use serde::{Serialize, Serializer};
use serde_json::Value;

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Fail,
}

impl Outcome {
    pub fn from_passed(passed: bool) -> Self {
        if passed { Outcome::Success } else { Outcome::Fail }
    }

    /// Wire code kept for existing consumers: 1 = success, 2 = fail.
    pub fn code(self) -> u8 {
        match self {
            Outcome::Success => 1,
            Outcome::Fail => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Fail => "fail",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Fail => "FAIL",
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// One step of an evaluation, shown verbatim to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub message: String,
    pub data: Value,
}

/// Append-only, ordered record of how a verdict was reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DebugTrace {
    entries: Vec<TraceEntry>,
}

impl DebugTrace {
    pub fn push(&mut self, message: impl Into<String>, data: Value) {
        self.entries.push(TraceEntry {
            message: message.into(),
            data,
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.last()
    }

    /// True if any entry's message starts with `prefix`.
    pub fn has_message(&self, prefix: &str) -> bool {
        self.entries.iter().any(|e| e.message.starts_with(prefix))
    }
}

/// Final answer for one inject: `{"outcome": 1|2, "debug": [...]}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub debug: DebugTrace,
}

impl Verdict {
    pub fn fail(debug: DebugTrace) -> Self {
        Self {
            outcome: Outcome::Fail,
            debug,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_codes() {
        assert_eq!(Outcome::Success.code(), 1);
        assert_eq!(Outcome::Fail.code(), 2);
        assert_eq!(Outcome::from_passed(true), Outcome::Success);
    }

    #[test]
    fn verdict_wire_shape() {
        let mut debug = DebugTrace::default();
        debug.push("Fetched entries", json!(3));
        let verdict = Verdict::fail(debug);
        assert_eq!(
            serde_json::to_value(&verdict).unwrap(),
            json!({"outcome": 2, "debug": [{"message": "Fetched entries", "data": 3}]})
        );
    }

    #[test]
    fn trace_keeps_order() {
        let mut debug = DebugTrace::default();
        debug.push("first", Value::Null);
        debug.push("second", Value::Null);
        let messages: Vec<&str> = debug.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["first", "second"]);
        assert!(debug.has_message("sec"));
    }
}
