//! Comparison operators applied to an extracted value.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an extracted value is compared against a rule's expected values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[serde(alias = "eq", alias = "==")]
    Equals,
    #[serde(alias = "neq", alias = "not-equals", alias = "!=")]
    NotEquals,
    #[serde(alias = "equals-any", alias = "in")]
    EqualsAny,
    Contains,
    #[serde(alias = "contains-any")]
    ContainsAny,
    /// Whole-value match.
    Regex,
    /// Pattern found anywhere in the value.
    #[serde(alias = "contains-regex", alias = "matches")]
    ContainsRegex,
    Count,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Equals => "equals",
            Comparison::NotEquals => "not_equals",
            Comparison::EqualsAny => "equals_any",
            Comparison::Contains => "contains",
            Comparison::ContainsAny => "contains_any",
            Comparison::Regex => "regex",
            Comparison::ContainsRegex => "contains_regex",
            Comparison::Count => "count",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("'{0}' needs at least one expected value")]
    MissingExpected(&'static str),

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid count expression '{0}'")]
    InvalidCount(String),

    #[error("'{op}' needs a numeric expected value, got {value}")]
    NotNumeric { op: &'static str, value: String },
}

/// Numeric relation used by `count` and the ordering operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Relation {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Relation::Eq => left == right,
            Relation::Ne => left != right,
            Relation::Gt => left > right,
            Relation::Ge => left >= right,
            Relation::Lt => left < right,
            Relation::Le => left <= right,
        }
    }
}

/// Compare `actual` against `expected` with `op`.
///
/// `Ok(false)` means the data did not satisfy the rule; `Err` means the rule
/// itself is unusable (no expected value, bad regex, ...).
///
/// An empty `expected` list is only meaningful for `equals` and
/// `not_equals`, where it stands for the empty array.
pub fn compare(op: Comparison, actual: &Value, expected: &[Value]) -> Result<bool, CompareError> {
    let Some(first) = expected.first() else {
        return match op {
            Comparison::Equals => Ok(equals(actual, expected)),
            Comparison::NotEquals => Ok(!equals(actual, expected)),
            _ => Err(CompareError::MissingExpected(op.as_str())),
        };
    };
    match op {
        Comparison::Equals => Ok(equals(actual, expected)),
        Comparison::NotEquals => Ok(!equals(actual, expected)),
        Comparison::EqualsAny => Ok(match actual {
            Value::Array(items) => items
                .iter()
                .any(|item| expected.iter().any(|e| loose_eq(item, e))),
            _ => expected.iter().any(|e| loose_eq(actual, e)),
        }),
        Comparison::Contains => Ok(expected.iter().all(|e| contains(actual, e))),
        Comparison::ContainsAny => Ok(expected.iter().any(|e| contains(actual, e))),
        Comparison::Regex => matches_pattern(&text(first), true, actual),
        Comparison::ContainsRegex => matches_pattern(&text(first), false, actual),
        Comparison::Count => {
            let (relation, bound) = parse_count(first)?;
            Ok(relation.holds(length(actual) as f64, bound))
        }
        Comparison::Gt => ordered(op, Relation::Gt, actual, first),
        Comparison::Gte => ordered(op, Relation::Ge, actual, first),
        Comparison::Lt => ordered(op, Relation::Lt, actual, first),
        Comparison::Lte => ordered(op, Relation::Le, actual, first),
    }
}

/// Arrays compare as sets against the expected list; anything else must
/// equal every expected value. An empty list only equals the empty array.
fn equals(actual: &Value, expected: &[Value]) -> bool {
    match actual {
        Value::Array(items) => {
            items.iter().all(|i| expected.iter().any(|e| loose_eq(i, e)))
                && expected.iter().all(|e| items.iter().any(|i| loose_eq(i, e)))
        }
        _ => !expected.is_empty() && expected.iter().all(|e| loose_eq(actual, e)),
    }
}

/// `anchored` requires the whole value to match, otherwise any occurrence counts.
/// Arrays match when one item does.
fn matches_pattern(pattern: &str, anchored: bool, actual: &Value) -> Result<bool, CompareError> {
    let source = if anchored {
        format!("^(?:{pattern})$")
    } else {
        pattern.to_string()
    };
    let re = Regex::new(&source).map_err(|e| CompareError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match actual {
        Value::Array(items) => items.iter().any(|item| re.is_match(&text(item))),
        Value::Null | Value::Object(_) => false,
        scalar => re.is_match(&text(scalar)),
    })
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match actual {
        Value::String(s) => s.to_lowercase().contains(&text(needle).to_lowercase()),
        Value::Array(items) => items.iter().any(|i| loose_eq(i, needle)),
        Value::Object(map) => map.contains_key(&text(needle)),
        _ => false,
    }
}

fn ordered(op: Comparison, relation: Relation, actual: &Value, bound: &Value) -> Result<bool, CompareError> {
    let bound = number(bound).ok_or_else(|| CompareError::NotNumeric {
        op: op.as_str(),
        value: bound.to_string(),
    })?;
    Ok(match actual {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .all(|item| number(item).is_some_and(|n| relation.holds(n, bound))),
        _ => number(actual).is_some_and(|n| relation.holds(n, bound)),
    })
}

/// Equality that tolerates the usual string/number/bool mismatches of
/// platform JSON (ids as strings, flags as "1"/"0").
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            parse_bool(s) == Some(*x)
        }
        (Value::Bool(x), Value::Number(n)) | (Value::Number(n), Value::Bool(x)) => {
            n.as_f64() == Some(if *x { 1.0 } else { 0.0 })
        }
        _ => a == b,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn length(v: &Value) -> usize {
    match v {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        _ => 1,
    }
}

/// `N`, `=N`, `==N`, `!=N`, `>N`, `>=N`, `<N`, `<=N`.
fn parse_count(expr: &Value) -> Result<(Relation, f64), CompareError> {
    if let Value::Number(n) = expr {
        return n
            .as_f64()
            .map(|n| (Relation::Eq, n))
            .ok_or_else(|| CompareError::InvalidCount(expr.to_string()));
    }
    let raw = text(expr);
    let s = raw.trim();
    let (relation, rest) = [
        (">=", Relation::Ge),
        ("<=", Relation::Le),
        ("==", Relation::Eq),
        ("!=", Relation::Ne),
        (">", Relation::Gt),
        ("<", Relation::Lt),
        ("=", Relation::Eq),
    ]
    .iter()
    .find_map(|(prefix, rel)| s.strip_prefix(prefix).map(|rest| (*rel, rest)))
    .unwrap_or((Relation::Eq, s));
    rest.trim()
        .parse::<f64>()
        .map(|n| (relation, n))
        .map_err(|_| CompareError::InvalidCount(raw.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(op: Comparison, actual: Value, expected: Value) -> bool {
        let expected = match expected {
            Value::Array(items) => items,
            other => vec![other],
        };
        compare(op, &actual, &expected).unwrap()
    }

    #[test]
    fn aliases_deserialize() {
        for (name, op) in [
            ("eq", Comparison::Equals),
            ("equals", Comparison::Equals),
            ("neq", Comparison::NotEquals),
            ("regex", Comparison::Regex),
            ("contains-regex", Comparison::ContainsRegex),
            ("matches", Comparison::ContainsRegex),
            (">=", Comparison::Gte),
        ] {
            let parsed: Comparison = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(parsed, op, "{name}");
        }
        assert!(serde_json::from_value::<Comparison>(json!("roughly")).is_err());
    }

    #[test]
    fn equals_is_loose_on_scalars() {
        assert!(check(Comparison::Equals, json!("ok"), json!("ok")));
        assert!(check(Comparison::Equals, json!("42"), json!(42)));
        assert!(check(Comparison::Equals, json!(true), json!("1")));
        assert!(!check(Comparison::Equals, json!("ok"), json!("OK")));
        assert!(!check(Comparison::Equals, json!(null), json!("ok")));
    }

    #[test]
    fn equals_flips_with_not_equals() {
        assert!(!check(Comparison::NotEquals, json!("ok"), json!("ok")));
        assert!(check(Comparison::NotEquals, json!("ok"), json!("fail")));
    }

    #[test]
    fn equals_on_arrays_is_set_equality() {
        assert!(check(Comparison::Equals, json!(["b", "a"]), json!(["a", "b"])));
        assert!(!check(Comparison::Equals, json!(["a"]), json!(["a", "b"])));
        assert!(!check(Comparison::Equals, json!(["a", "c"]), json!(["a"])));
    }

    #[test]
    fn equals_any() {
        assert!(check(Comparison::EqualsAny, json!("tlp:red"), json!(["tlp:amber", "tlp:red"])));
        assert!(check(Comparison::EqualsAny, json!(["x", "tlp:red"]), json!(["tlp:red"])));
        assert!(!check(Comparison::EqualsAny, json!("tlp:white"), json!(["tlp:red"])));
    }

    #[test]
    fn contains_by_shape() {
        assert!(check(Comparison::Contains, json!("Phishing Campaign 2024"), json!(["phishing", "campaign"])));
        assert!(!check(Comparison::Contains, json!("Phishing"), json!(["phishing", "malware"])));
        assert!(check(Comparison::Contains, json!(["a", "b", "c"]), json!(["a", "c"])));
        assert!(check(Comparison::Contains, json!({"Event": 1}), json!("Event")));
        assert!(!check(Comparison::Contains, json!(12), json!("1")));
        assert!(check(Comparison::ContainsAny, json!(["a"]), json!(["z", "a"])));
    }

    #[test]
    fn regex_is_anchored() {
        assert!(check(Comparison::Regex, json!("10.0.0.1"), json!(r"\d+\.\d+\.\d+\.\d+")));
        assert!(!check(Comparison::Regex, json!("ip 10.0.0.1"), json!(r"\d+\.\d+\.\d+\.\d+")));
        assert!(check(Comparison::Regex, json!(["x", "abc"]), json!("a.c")));
    }

    #[test]
    fn contains_regex_searches() {
        assert!(check(Comparison::ContainsRegex, json!("Phishing campaign"), json!("(?i)phish")));
        assert!(check(Comparison::ContainsRegex, json!("ip 10.0.0.1"), json!(r"\d+\.\d+\.\d+\.\d+")));
        assert!(!check(Comparison::ContainsRegex, json!("Phishing campaign"), json!("malware")));
        assert!(!check(Comparison::Regex, json!("Phishing campaign"), json!("(?i)phish")));
        assert!(check(Comparison::ContainsRegex, json!(["x", "tlp:red"]), json!("red")));
    }

    #[test]
    fn bad_regex_is_an_error() {
        let err = compare(Comparison::Regex, &json!("x"), &[json!("(")]).unwrap_err();
        assert!(matches!(err, CompareError::InvalidRegex { .. }));
    }

    #[test]
    fn count_expressions() {
        assert!(check(Comparison::Count, json!([1, 2, 3]), json!(3)));
        assert!(check(Comparison::Count, json!([1, 2, 3]), json!(">=2")));
        assert!(check(Comparison::Count, json!([1, 2, 3]), json!("<4")));
        assert!(!check(Comparison::Count, json!([1, 2, 3]), json!("!=3")));
        assert!(check(Comparison::Count, json!(null), json!("0")));
        assert!(check(Comparison::Count, json!({"a": 1}), json!("==1")));
        assert!(matches!(
            compare(Comparison::Count, &json!([]), &[json!("lots")]),
            Err(CompareError::InvalidCount(_))
        ));
    }

    #[test]
    fn ordering_operators() {
        assert!(check(Comparison::Gt, json!(5), json!(3)));
        assert!(check(Comparison::Gte, json!("5"), json!(5)));
        assert!(check(Comparison::Lt, json!([1, 2]), json!(3)));
        assert!(!check(Comparison::Lt, json!([1, 4]), json!(3)));
        assert!(!check(Comparison::Lte, json!("n/a"), json!(3)));
        assert!(matches!(
            compare(Comparison::Gt, &json!(1), &[json!("many")]),
            Err(CompareError::NotNumeric { .. })
        ));
    }

    #[test]
    fn missing_expected_is_an_error() {
        assert_eq!(
            compare(Comparison::Count, &json!([]), &[]),
            Err(CompareError::MissingExpected("count"))
        );
        assert_eq!(
            compare(Comparison::Contains, &json!("x"), &[]),
            Err(CompareError::MissingExpected("contains"))
        );
    }

    #[test]
    fn null_and_empty_array_equal_themselves() {
        assert!(check(Comparison::Equals, json!(null), json!([null])));
        assert!(!check(Comparison::NotEquals, json!(null), json!([null])));
        assert!(check(Comparison::NotEquals, json!(null), json!("x")));

        assert_eq!(compare(Comparison::Equals, &json!([]), &[]), Ok(true));
        assert_eq!(compare(Comparison::NotEquals, &json!([]), &[]), Ok(false));
        assert_eq!(compare(Comparison::Equals, &json!(["a"]), &[]), Ok(false));
        assert_eq!(compare(Comparison::Equals, &json!("a"), &[]), Ok(false));
        assert!(check(Comparison::NotEquals, json!([]), json!(["x"])));
    }
}
