//! `query_search`: rules matched against records fetched from the platform.

use serde_json::json;

use super::{MatchMode, RuleCheck};
use crate::eval::{DebugTrace, EvaluationContext};
use crate::fetch::FetchedDataset;

/// Evaluate the rules over `dataset` according to `mode`.
///
/// Per-entry or whole-payload checking is chosen by `mode` alone; a rule's
/// extract type only shapes what it extracts from the value it is given.
///
/// The entry count is traced first. In `any` mode the scan stops at the
/// first matching entry and in `all` mode at the first failing one. An
/// empty result set never passes in either mode.
pub fn evaluate(
    check: &RuleCheck<'_>,
    dataset: &FetchedDataset,
    mode: MatchMode,
    ctx: &mut EvaluationContext,
    trace: &mut DebugTrace,
) -> bool {
    let entries = dataset.entries();
    trace.push("Fetched entries", json!(entries.len()));

    match mode {
        MatchMode::Dataset => check.run(&dataset.to_value(), None, ctx, trace),
        MatchMode::Any => {
            for (index, entry) in entries.iter().enumerate() {
                if check.run(entry, Some(index), ctx, trace) {
                    trace.push("Matching entry found", json!({"entry": index}));
                    return true;
                }
            }
            trace.push(
                "No entry satisfies every rule",
                json!({"entries": entries.len(), "match_mode": mode.as_str()}),
            );
            false
        }
        MatchMode::All => {
            if entries.is_empty() {
                trace.push("No entries to match", json!({"match_mode": mode.as_str()}));
                return false;
            }
            for (index, entry) in entries.iter().enumerate() {
                if !check.run(entry, Some(index), ctx, trace) {
                    trace.push("Entry does not satisfy every rule", json!({"entry": index}));
                    return false;
                }
            }
            trace.push(
                "Every entry satisfies every rule",
                json!({"entries": entries.len()}),
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::spec::ExtractionRule;
    use crate::path::ExtractType;
    use serde_json::{Value, json};

    fn run(params: Value, dataset: FetchedDataset, mode: MatchMode) -> (bool, DebugTrace) {
        let rules = ExtractionRule::from_parameters(params.as_array().unwrap()).unwrap();
        let check = RuleCheck {
            rules: &rules,
            default_extract: ExtractType::First,
        };
        let mut ctx = EvaluationContext::default();
        let mut trace = DebugTrace::default();
        let passed = evaluate(&check, &dataset, mode, &mut ctx, &mut trace);
        (passed, trace)
    }

    fn events() -> FetchedDataset {
        FetchedDataset::Json(json!({"response": [
            {"Event": {"id": "1", "info": "routine scan"}},
            {"Event": {"id": "42", "info": "Phishing campaign"}}
        ]}))
    }

    fn phishing_rule() -> Value {
        json!([{"path": ".Event.info", "op": "contains", "expected": "phishing"}])
    }

    #[test]
    fn first_trace_entry_is_the_count() {
        let (_, trace) = run(phishing_rule(), events(), MatchMode::Any);
        assert_eq!(trace.entries()[0].message, "Fetched entries");
        assert_eq!(trace.entries()[0].data, json!(2));
    }

    #[test]
    fn any_entry_suffices() {
        let (passed, trace) = run(phishing_rule(), events(), MatchMode::Any);
        assert!(passed);
        assert_eq!(trace.last().unwrap().message, "Matching entry found");
        assert_eq!(trace.last().unwrap().data, json!({"entry": 1}));
    }

    #[test]
    fn all_entries_required() {
        let (passed, trace) = run(phishing_rule(), events(), MatchMode::All);
        assert!(!passed);
        assert_eq!(trace.last().unwrap().data, json!({"entry": 0}));
    }

    #[test]
    fn rule_trace_carries_entry_index() {
        let (_, trace) = run(phishing_rule(), events(), MatchMode::Any);
        assert_eq!(trace.entries()[1].data["entry"], json!(0));
        assert_eq!(trace.entries()[2].data["entry"], json!(1));
    }

    #[test]
    fn bare_sequence_dataset() {
        let dataset = FetchedDataset::Json(json!([{"value": "8.8.8.8"}, {"value": "1.1.1.1"}]));
        let (passed, trace) = run(
            json!([{"path": ".value", "op": "eq", "expected": "1.1.1.1"}]),
            dataset,
            MatchMode::Any,
        );
        assert!(passed);
        assert_eq!(trace.entries()[0].data, json!(2));
    }

    #[test]
    fn dataset_mode_sees_the_wrapper() {
        let (passed, _) = run(
            json!([{"path": ".response[].Event.id", "op": "contains", "expected": "42", "extract_type": "all"}]),
            events(),
            MatchMode::Dataset,
        );
        assert!(passed);
    }

    #[test]
    fn extract_all_still_checks_each_entry() {
        let (passed, trace) = run(
            json!([{"path": ".Event.id", "op": "eq", "expected": "42", "extract_type": "all"}]),
            events(),
            MatchMode::Any,
        );
        assert!(passed);
        assert_eq!(trace.entries()[1].data["entry"], json!(0));
        assert_eq!(trace.entries()[1].data["extracted"], json!(["1"]));
        assert_eq!(trace.entries()[2].data["extracted"], json!(["42"]));
    }

    #[test]
    fn empty_result_fails() {
        let empty = FetchedDataset::Json(json!({"response": []}));
        let (passed, _) = run(json!([]), empty.clone(), MatchMode::Any);
        assert!(!passed);
        let (passed, _) = run(json!([]), empty, MatchMode::All);
        assert!(!passed);
    }

    #[test]
    fn text_response_is_one_entry() {
        let (passed, _) = run(
            json!([{"path": ".", "op": "contains", "expected": "saved"}]),
            FetchedDataset::Text("Event saved".into()),
            MatchMode::Any,
        );
        assert!(passed);
    }
}
