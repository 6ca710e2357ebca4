use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder regex must compile"));

/// Values carried across the rule checks of a single evaluation.
///
/// Seeded from the request, extended by rules with `store_as`, dropped when
/// the evaluation returns. `{{name}}` placeholders in paths, expected values
/// and query URLs are resolved against it.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    vars: Map<String, Value>,
}

impl EvaluationContext {
    /// Build a context from the request's target tool and extra variables.
    pub fn seeded(target_tool: &str, extra: &Map<String, Value>) -> Self {
        let mut vars = extra.clone();
        vars.insert("target_tool".into(), Value::String(target_tool.to_string()));
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Replace every `{{name}}` in `template`. Unknown names become empty.
    pub fn render(&self, template: &str) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match self.vars.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .into_owned()
    }

    /// Render every string inside `value`, keys left untouched.
    pub fn render_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.render(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
