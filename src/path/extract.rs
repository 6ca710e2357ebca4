use std::borrow::Cow;

use serde_json::Value;

use super::PathError;
use super::types::{PathExpr, Step, StepKind, type_name};

static NULL: Value = Value::Null;

/// Run a parsed path against `root`, returning every match in document order.
///
/// Borrowed values are handed out wherever the step selects an existing
/// node; only slices allocate.
pub fn run<'a>(path: &PathExpr, root: &'a Value) -> Result<Vec<Cow<'a, Value>>, PathError> {
    let mut current = vec![Cow::Borrowed(root)];
    for step in &path.steps {
        let mut next = Vec::new();
        for value in current {
            match apply(step, value) {
                Ok(mut out) => next.append(&mut out),
                Err(_) if step.optional => {}
                Err(e) => return Err(e),
            }
        }
        current = next;
    }
    Ok(current)
}

fn apply<'a>(step: &Step, value: Cow<'a, Value>) -> Result<Vec<Cow<'a, Value>>, PathError> {
    match value {
        Cow::Borrowed(v) => apply_borrowed(&step.kind, v),
        Cow::Owned(v) => {
            let out = apply_borrowed(&step.kind, &v)?;
            Ok(out
                .into_iter()
                .map(|c| Cow::Owned(c.into_owned()))
                .collect())
        }
    }
}

fn apply_borrowed<'a>(kind: &StepKind, value: &'a Value) -> Result<Vec<Cow<'a, Value>>, PathError> {
    match kind {
        StepKind::Field(name) => match value {
            Value::Object(map) => Ok(vec![Cow::Borrowed(map.get(name).unwrap_or(&NULL))]),
            Value::Null => Ok(vec![Cow::Borrowed(&NULL)]),
            other => Err(PathError::Type(format!(
                "cannot index {} with \"{name}\"",
                type_name(other)
            ))),
        },
        StepKind::Index(i) => match value {
            Value::Array(items) => {
                let item = resolve_index(*i, items.len()).and_then(|idx| items.get(idx));
                Ok(vec![Cow::Borrowed(item.unwrap_or(&NULL))])
            }
            Value::Null => Ok(vec![Cow::Borrowed(&NULL)]),
            other => Err(PathError::Type(format!(
                "cannot index {} with number",
                type_name(other)
            ))),
        },
        StepKind::Slice(start, end) => match value {
            Value::Array(items) => {
                let (from, to) = slice_bounds(*start, *end, items.len());
                Ok(vec![Cow::Owned(Value::Array(items[from..to].to_vec()))])
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (from, to) = slice_bounds(*start, *end, chars.len());
                Ok(vec![Cow::Owned(Value::String(chars[from..to].iter().collect()))])
            }
            Value::Null => Ok(vec![Cow::Borrowed(&NULL)]),
            other => Err(PathError::Type(format!("cannot slice {}", type_name(other)))),
        },
        StepKind::Iterate => match value {
            Value::Array(items) => Ok(items.iter().map(Cow::Borrowed).collect()),
            Value::Object(map) => Ok(map.values().map(Cow::Borrowed).collect()),
            other => Err(PathError::Type(format!(
                "cannot iterate over {}",
                type_name(other)
            ))),
        },
        StepKind::Recurse => {
            let mut out = Vec::new();
            descend(value, &mut out);
            Ok(out)
        }
    }
}

/// Pre-order walk: the node, then each child subtree.
fn descend<'a>(value: &'a Value, out: &mut Vec<Cow<'a, Value>>) {
    out.push(Cow::Borrowed(value));
    match value {
        Value::Array(items) => items.iter().for_each(|v| descend(v, out)),
        Value::Object(map) => map.values().for_each(|v| descend(v, out)),
        _ => {}
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        usize::try_from(i).ok()
    } else {
        let back = usize::try_from(i.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

/// Clamp jq-style slice bounds (negative = from the end) into `0..=len`.
fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        let len_i = len as i64;
        let idx = if i < 0 { len_i + i } else { i };
        idx.clamp(0, len_i) as usize
    };
    let from = start.map_or(0, clamp);
    let to = end.map_or(len, clamp);
    (from, to.max(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse;
    use serde_json::json;

    fn all(path: &str, data: &Value) -> Vec<Value> {
        run(&parse(path).unwrap(), data)
            .unwrap()
            .into_iter()
            .map(Cow::into_owned)
            .collect()
    }

    #[test]
    fn missing_key_is_null() {
        assert_eq!(all(".nope", &json!({"a": 1})), vec![Value::Null]);
    }

    #[test]
    fn null_propagates() {
        assert_eq!(all(".a.b.c", &json!({"a": null})), vec![Value::Null]);
        assert_eq!(all(".a[3]", &json!({})), vec![Value::Null]);
    }

    #[test]
    fn negative_index() {
        assert_eq!(all(".[-1]", &json!([1, 2, 3])), vec![json!(3)]);
        assert_eq!(all(".[-4]", &json!([1, 2, 3])), vec![Value::Null]);
        assert_eq!(all(".[7]", &json!([1, 2, 3])), vec![Value::Null]);
    }

    #[test]
    fn slice_array_and_string() {
        assert_eq!(all(".[1:]", &json!([1, 2, 3])), vec![json!([2, 3])]);
        assert_eq!(all(".[-2:]", &json!([1, 2, 3])), vec![json!([2, 3])]);
        assert_eq!(all(".[2:1]", &json!([1, 2, 3])), vec![json!([])]);
        assert_eq!(all(".[:3]", &json!("abcdef")), vec![json!("abc")]);
    }

    #[test]
    fn slice_then_iterate_stays_owned() {
        assert_eq!(
            all(".[1:][].id", &json!([{"id": 1}, {"id": 2}, {"id": 3}])),
            vec![json!(2), json!(3)]
        );
    }

    #[test]
    fn iterate_object_values_in_document_order() {
        let data: Value = serde_json::from_str(r#"{"z": 1, "a": 2}"#).unwrap();
        assert_eq!(all(".[]", &data), vec![json!(1), json!(2)]);
    }

    #[test]
    fn recurse_is_preorder() {
        let data = json!({"a": {"id": 1}, "b": [{"id": 2}]});
        // root yields null, scalars and the array are dropped by `?`
        assert_eq!(all(".. | .id?", &data).len(), 3);
        let ids: Vec<Value> = all(".. | .id?", &data)
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }

    #[test]
    fn index_scalar_is_type_error() {
        let err = run(&parse(".a.b").unwrap(), &json!({"a": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "cannot index string with \"b\"");
    }

    #[test]
    fn iterate_null_is_type_error() {
        let err = run(&parse(".a[]").unwrap(), &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "cannot iterate over null");
    }

    #[test]
    fn optional_drops_failing_inputs() {
        let data = json!([{"tags": ["x"]}, {"tags": "y"}, {"tags": ["z"]}]);
        assert_eq!(all(".[].tags[]?", &data), vec![json!("x"), json!("z")]);
    }
}
