//! Evaluation strategies: how an inject's rules are applied to its data.
//!
//! The set is closed. [`EvaluationStrategy`] names every strategy and the
//! dispatcher matches on it exhaustively; each strategy module holds the
//! logic for one variant. Rule checking itself is shared here.

/// Comparison operators and loose JSON equality.
pub mod compare;
/// Rules against a caller-supplied JSON payload.
pub mod data_filtering;
/// Declared mirror strategy, never satisfied.
pub mod query_mirror;
/// Rules against records fetched from the remote platform.
pub mod query_search;

pub use compare::{CompareError, Comparison};

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::eval::spec::{ConfigError, ExtractionRule};
use crate::eval::{DebugTrace, EvaluationContext};
use crate::path::{self, ExtractType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    DataFiltering,
    QuerySearch,
    QueryMirror,
}

impl EvaluationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStrategy::DataFiltering => "data_filtering",
            EvaluationStrategy::QuerySearch => "query_search",
            EvaluationStrategy::QueryMirror => "query_mirror",
        }
    }
}

impl FromStr for EvaluationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "data_filtering" => Ok(EvaluationStrategy::DataFiltering),
            "query_search" => Ok(EvaluationStrategy::QuerySearch),
            "query_mirror" => Ok(EvaluationStrategy::QueryMirror),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// How `query_search` combines its rules over the fetched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// At least one entry satisfies every rule.
    #[default]
    Any,
    /// Every entry satisfies every rule.
    All,
    /// Rules run once against the whole fetched payload.
    Dataset,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::Any => "any",
            MatchMode::All => "all",
            MatchMode::Dataset => "dataset",
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(MatchMode::Any),
            "all" => Ok(MatchMode::All),
            "dataset" => Ok(MatchMode::Dataset),
            other => Err(format!("unknown match mode '{other}' (expected any, all or dataset)")),
        }
    }
}

/// Shared inputs of every rule check in one evaluation.
pub struct RuleCheck<'a> {
    pub rules: &'a [ExtractionRule],
    pub default_extract: ExtractType,
}

impl RuleCheck<'_> {
    /// Check every rule against `data`, tracing each one.
    ///
    /// All rules are evaluated even after a failure so the trace shows every
    /// problem at once. `entry` tags trace data with the record index when
    /// checking fetched search results.
    pub fn run(
        &self,
        data: &Value,
        entry: Option<usize>,
        ctx: &mut EvaluationContext,
        trace: &mut DebugTrace,
    ) -> bool {
        let mut passed = true;
        for rule in self.rules {
            let (ok, message, mut detail) = self.check(rule, data, ctx);
            log::debug!("{message}: {detail}");
            if let (Some(index), Value::Object(map)) = (entry, &mut detail) {
                map.insert("entry".into(), json!(index));
            }
            trace.push(message, detail);
            passed &= ok;
        }
        passed
    }

    fn check(
        &self,
        rule: &ExtractionRule,
        data: &Value,
        ctx: &mut EvaluationContext,
    ) -> (bool, &'static str, Value) {
        let path = ctx.render(&rule.path);
        let extract_type = rule.extract_type.unwrap_or(self.default_extract);

        let matches = match path::extract(&path, data, extract_type) {
            Ok(m) => m,
            Err(e) => {
                return (
                    false,
                    "Invalid path",
                    json!({"path": path, "error": e.to_string()}),
                );
            }
        };
        let Some(extracted) = extract_type.collapse(matches) else {
            return (
                false,
                "Could not extract data",
                json!({"path": path, "extract_type": extract_type.as_str()}),
            );
        };

        let expected: Option<Vec<Value>> = rule
            .expected
            .as_ref()
            .map(|values| values.iter().map(|v| ctx.render_value(v)).collect());
        let result = match &expected {
            Some(values) => compare::compare(rule.comparison, &extracted, values),
            None => Err(CompareError::MissingExpected(rule.comparison.as_str())),
        };
        let mut detail = json!({
            "path": path,
            "comparison": rule.comparison.as_str(),
            "expected": expected,
            "extracted": extracted,
        });
        if let Some(name) = &rule.store_as {
            ctx.set(name.clone(), extracted);
        }

        match result {
            Ok(true) => (true, "Condition satisfied", detail),
            Ok(false) => (false, "Condition not satisfied", detail),
            Err(e) => {
                detail["error"] = json!(e.to_string());
                (false, "Invalid rule configuration", detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for s in [
            EvaluationStrategy::DataFiltering,
            EvaluationStrategy::QuerySearch,
            EvaluationStrategy::QueryMirror,
        ] {
            assert_eq!(s.as_str().parse::<EvaluationStrategy>(), Ok(s));
        }
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        assert_eq!(
            "rules_engine".parse::<EvaluationStrategy>(),
            Err(ConfigError::UnknownStrategy("rules_engine".into()))
        );
    }

    #[test]
    fn match_mode_parse() {
        assert_eq!("ALL".parse::<MatchMode>(), Ok(MatchMode::All));
        assert!("most".parse::<MatchMode>().is_err());
    }
}
