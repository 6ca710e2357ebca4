//! inject-eval: decides whether an exercise inject was completed.
//!
//! An inject carries evaluation rules: JQ-style paths into a JSON document,
//! each with a comparison against expected values. The engine applies those
//! rules under one of three strategies and returns a [`eval::Verdict`]:
//! an outcome (`1` success, `2` fail) plus an ordered debug trace explaining
//! every step. Evaluation never errors out; misconfiguration, transport
//! failures and malformed data all end up as trace entries on a FAIL verdict.
//!
//! # Architecture
//!
//! - **[`path`]** — Path extraction: parser and traversal for the JQ subset.
//! - **[`fetch`]** — Remote platform queries with bounded timeouts.
//! - **[`strategies`]** — `data_filtering`, `query_search`, `query_mirror`, comparison operators.
//! - **[`eval`]** — Dispatcher, request/spec model, runtime context, verdict and trace.
//! - **[`config`]** — Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]** — `simplelog` setup and the per-verdict log line.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Evaluation dispatcher: spec model, context, verdicts.
pub mod eval;
/// HTTP client for the remote security platform.
pub mod fetch;
/// Logger initialisation and verdict records.
pub mod logging;
/// JQ-style path parsing and extraction.
pub mod path;
/// Evaluation strategies and rule checking.
pub mod strategies;

use eval::{InjectTestRequest, Verdict};

pub use path::test_path;

/// Build an evaluator from the default config and evaluate a request.
///
/// This is the main entry point for tests and simple usage.
/// For CLI usage with user config or flag overrides, build the evaluator directly.
pub async fn evaluate(request: &InjectTestRequest) -> Verdict {
    let config = config::Config::default_config();
    let evaluator = eval::Evaluator::from_config(&config);
    evaluator.evaluate(request).await
}
