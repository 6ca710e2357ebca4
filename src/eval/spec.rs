//! Evaluation inputs: the test request and the inject evaluation definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fetch::Method;
use crate::path::ExtractType;
use crate::strategies::{Comparison, EvaluationStrategy, MatchMode};

/// Problems with an evaluation definition. Always reported in the trace.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown evaluation strategy '{0}'")]
    UnknownStrategy(String),

    #[error("parameter #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("invalid score range [{lower}, {upper}]")]
    InvalidScoreRange { lower: f64, upper: f64 },
}

/// One extraction rule: where to look and what must be found there.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRule {
    pub path: String,
    /// `None` uses the configured default.
    pub extract_type: Option<ExtractType>,
    pub comparison: Comparison,
    /// `None` when the rule gives no expected value at all. An explicit
    /// `null` is the single expected value `null`.
    pub expected: Option<Vec<Value>>,
    /// Save the extracted value in the evaluation context under this name.
    pub store_as: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleBody {
    #[serde(default)]
    path: Option<String>,
    #[serde(alias = "op", alias = "operator")]
    comparison: Comparison,
    #[serde(default, alias = "values", deserialize_with = "present")]
    expected: Option<Value>,
    #[serde(default)]
    extract_type: Option<String>,
    #[serde(default)]
    store_as: Option<String>,
}

impl ExtractionRule {
    /// Read the rules held by one `parameters` entry.
    ///
    /// Two shapes are accepted: a flat rule carrying its own `path`, or the
    /// scenario-file form where each key is a path and its value the rule
    /// body. The keyed form may hold several rules, kept in document order.
    pub fn from_parameter(index: usize, param: &Value) -> Result<Vec<Self>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRule { index, reason };
        let Value::Object(map) = param else {
            return Err(invalid(format!("expected an object, got {param}")));
        };

        if map.get("path").is_some_and(Value::is_string) {
            let body: RuleBody =
                serde_json::from_value(param.clone()).map_err(|e| invalid(e.to_string()))?;
            let path = body.path.clone().unwrap_or_default();
            return Ok(vec![Self::from_body(path, body)]);
        }

        map.iter()
            .map(|(path, body)| {
                if !body.is_object() {
                    return Err(invalid(format!("rule for '{path}' must be an object")));
                }
                let body: RuleBody = serde_json::from_value(body.clone())
                    .map_err(|e| invalid(format!("'{path}': {e}")))?;
                Ok(Self::from_body(path.clone(), body))
            })
            .collect()
    }

    fn from_body(path: String, body: RuleBody) -> Self {
        let expected = body.expected.map(|value| match value {
            Value::Array(items) => items,
            single => vec![single],
        });
        Self {
            path,
            extract_type: body.extract_type.as_deref().map(ExtractType::parse),
            comparison: body.comparison,
            expected,
            store_as: body.store_as.filter(|s| !s.is_empty()),
        }
    }

    /// Parse a whole `parameters` list.
    pub fn from_parameters(params: &[Value]) -> Result<Vec<Self>, ConfigError> {
        let mut rules = Vec::new();
        for (index, param) in params.iter().enumerate() {
            rules.extend(Self::from_parameter(index, param)?);
        }
        Ok(rules)
    }
}

/// A present key is `Some`, even when its value is `null`.
fn present<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// Inclusive score bounds, `[lower, upper]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct ScoreRange {
    pub lower: f64,
    pub upper: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 10.0,
        }
    }
}

impl From<(f64, f64)> for ScoreRange {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self { lower, upper }
    }
}

impl From<ScoreRange> for (f64, f64) {
    fn from(range: ScoreRange) -> Self {
        (range.lower, range.upper)
    }
}

/// Where and how `query_search` / `query_mirror` query the platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "method_from_str")]
    pub request_method: Method,
    #[serde(default)]
    pub payload: Value,
}

fn method_from_str<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Method, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().map(Method::parse).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EvaluationSettings {
    #[serde(default)]
    pub query_context: Option<QueryContext>,
    /// Overrides the configured `query_search` match mode.
    #[serde(default)]
    pub match_mode: Option<MatchMode>,
}

/// Loosely typed evaluation entry as stored in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInjectEvaluation {
    pub evaluation_strategy: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub evaluation_context: EvaluationSettings,
    #[serde(default)]
    pub score_range: Option<ScoreRange>,
}

/// Validated, read-only evaluation definition of an inject.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawInjectEvaluation")]
pub struct InjectEvaluationSpec {
    pub evaluation_strategy: EvaluationStrategy,
    pub parameters: Vec<ExtractionRule>,
    pub evaluation_context: EvaluationSettings,
    pub score_range: ScoreRange,
}

impl TryFrom<RawInjectEvaluation> for InjectEvaluationSpec {
    type Error = ConfigError;

    fn try_from(raw: RawInjectEvaluation) -> Result<Self, Self::Error> {
        let evaluation_strategy = raw.evaluation_strategy.parse::<EvaluationStrategy>()?;
        let parameters = ExtractionRule::from_parameters(&raw.parameters)?;
        let score_range = raw.score_range.unwrap_or_default();
        let ScoreRange { lower, upper } = score_range;
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(ConfigError::InvalidScoreRange { lower, upper });
        }
        Ok(Self {
            evaluation_strategy,
            parameters,
            evaluation_context: raw.evaluation_context,
            score_range,
        })
    }
}

/// An ad-hoc evaluation request, as sent by the scenario editor's
/// "test inject" action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InjectTestRequest {
    #[serde(default)]
    pub target_tool: String,
    pub evaluation_strategy: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eval_params: Vec<Value>,

    #[serde(default)]
    pub test_data: Value,

    /// Extra `{{name}}` variables for this evaluation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Map<String, Value>,

    #[serde(default)]
    pub query_mirror_url: Option<String>,
    #[serde(default)]
    pub query_mirror_method: Option<String>,
    #[serde(default)]
    pub query_mirror_payload: Value,

    #[serde(default)]
    pub query_search_url: Option<String>,
    #[serde(default)]
    pub query_search_method: Option<String>,
    #[serde(default)]
    pub query_search_payload: Value,
    #[serde(default)]
    pub query_search_misp_url: Option<String>,
    #[serde(default)]
    pub query_search_misp_apikey: Option<String>,
    #[serde(default)]
    pub query_search_match: Option<MatchMode>,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Remote platform credentials for `query_search`.
#[derive(Debug, Clone, Copy)]
pub struct RemotePlatform<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
}

impl InjectTestRequest {
    /// Build the evaluation definition this request describes.
    ///
    /// The query context is taken from the `query_search_*` fields for
    /// `query_search` and from the `query_mirror_*` fields otherwise.
    pub fn to_spec(&self) -> Result<InjectEvaluationSpec, ConfigError> {
        let strategy = self.evaluation_strategy.parse::<EvaluationStrategy>()?;
        let (url, method, payload) = match strategy {
            EvaluationStrategy::QuerySearch => (
                &self.query_search_url,
                &self.query_search_method,
                &self.query_search_payload,
            ),
            _ => (
                &self.query_mirror_url,
                &self.query_mirror_method,
                &self.query_mirror_payload,
            ),
        };
        InjectEvaluationSpec::try_from(RawInjectEvaluation {
            evaluation_strategy: self.evaluation_strategy.clone(),
            parameters: self.eval_params.clone(),
            evaluation_context: EvaluationSettings {
                query_context: Some(QueryContext {
                    url: url.clone().unwrap_or_default(),
                    request_method: method.as_deref().map(Method::parse).unwrap_or_default(),
                    payload: payload.clone(),
                }),
                match_mode: self.query_search_match,
            },
            score_range: None,
        })
    }

    pub fn platform(&self) -> Option<RemotePlatform<'_>> {
        let url = self.query_search_misp_url.as_deref().filter(|u| !u.is_empty())?;
        Some(RemotePlatform {
            url,
            api_key: self.query_search_misp_apikey.as_deref().unwrap_or_default(),
        })
    }
}
