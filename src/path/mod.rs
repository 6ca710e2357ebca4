//! JQ-style path extraction over arbitrary JSON.
//!
//! A path is parsed once into [`PathExpr`] and then run against a value.
//! The supported subset covers object keys, array indices and slices,
//! iteration, recursive descent, `?` and pipes. Traversal never mutates
//! its input and performs no I/O.

pub mod extract;
pub mod parser;
pub mod types;

pub use parser::parse;
pub use types::{ExtractType, PathExpr, Step, StepKind};

use serde_json::Value;

/// A path that cannot be parsed, or that traverses a value of the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid path at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("{0}")]
    Type(String),
}

/// Extract matches of `path` from `value`.
///
/// `ExtractType::All` returns every match; `ExtractType::First` returns at
/// most the first of those same matches.
pub fn extract(path: &str, value: &Value, extract_type: ExtractType) -> Result<Vec<Value>, PathError> {
    let expr = parse(path)?;
    extract_parsed(&expr, value, extract_type)
}

/// Like [`extract`], for a path that has already been parsed.
pub fn extract_parsed(
    expr: &PathExpr,
    value: &Value,
    extract_type: ExtractType,
) -> Result<Vec<Value>, PathError> {
    let matches = extract::run(expr, value)?;
    let limit = match extract_type {
        ExtractType::All => usize::MAX,
        ExtractType::First => 1,
    };
    Ok(matches
        .into_iter()
        .take(limit)
        .map(std::borrow::Cow::into_owned)
        .collect())
}

/// Interactive path check: the extracted value(s) on success, or the error
/// text on failure.
///
/// With `first`, a path that matches nothing yields `null`.
pub fn test_path(path: &str, data: &Value, extract_type: ExtractType) -> Result<Value, String> {
    let matches = extract(path, data, extract_type).map_err(|e| e.to_string())?;
    Ok(extract_type.collapse(matches).unwrap_or(Value::Null))
}
