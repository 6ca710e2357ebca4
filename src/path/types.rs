//! Types produced by the path parser and consumed by the extractor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One traversal step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// `.key`, `."key"` or `.["key"]`: object member access
    Field(String),
    /// `.[n]`: array element, negative counts from the end
    Index(i64),
    /// `.[a:b]`: array or string slice
    Slice(Option<i64>, Option<i64>),
    /// `.[]`: every array element or object value
    Iterate,
    /// `..`: the value itself and every value nested below it
    Recurse,
}

/// A step plus its `?` suffix.
///
/// An optional step swallows type errors for the offending input instead of
/// failing the whole extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub optional: bool,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }
}

/// A parsed path expression.
///
/// Pipes are flattened at parse time: for this subset `.a | .b` selects
/// exactly what `.a.b` selects, so a path is one ordered list of steps.
/// The identity path `.` has no steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub source: String,
    pub steps: Vec<Step>,
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// How many matches an extraction keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractType {
    /// Every match.
    All,
    /// The first match only.
    #[default]
    First,
}

impl ExtractType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractType::All => "all",
            ExtractType::First => "first",
        }
    }

    /// Parse a configured extract type. Anything other than `all` selects a
    /// single match, mirroring how scenario files spell it loosely.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("all") {
            ExtractType::All
        } else {
            ExtractType::First
        }
    }

    /// Reduce a match list to the single value a rule compares against.
    ///
    /// `all` always yields an array (possibly empty); `first` yields the
    /// first match or `None` when nothing matched.
    pub fn collapse(self, matches: Vec<serde_json::Value>) -> Option<serde_json::Value> {
        match self {
            ExtractType::All => Some(serde_json::Value::Array(matches)),
            ExtractType::First => matches.into_iter().next(),
        }
    }
}

/// Name of a JSON value's type, as used in error messages.
pub fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
