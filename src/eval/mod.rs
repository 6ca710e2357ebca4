pub mod context;
pub mod spec;
pub mod verdict;

pub use context::EvaluationContext;
pub use spec::{ConfigError, ExtractionRule, InjectEvaluationSpec, InjectTestRequest, RemotePlatform};
pub use verdict::{DebugTrace, Outcome, TraceEntry, Verdict};

use std::future::Future;

use serde_json::{Value, json};

use crate::config::Config;
use crate::fetch::{FetchedDataset, RemoteFetcher};
use crate::path::ExtractType;
use crate::strategies::{
    EvaluationStrategy, MatchMode, RuleCheck, data_filtering, query_mirror, query_search,
};

/// Everything a strategy may consume besides its evaluation definition.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Payload checked by `data_filtering`.
    pub test_data: &'a Value,
    /// Platform queried by `query_search`.
    pub platform: Option<RemotePlatform<'a>>,
}

/// Evaluation dispatcher: picks the strategy, gathers its input and turns
/// every outcome, including failures, into a [`Verdict`].
///
/// Holds no per-evaluation state, so one instance serves concurrent
/// evaluations.
pub struct Evaluator {
    fetcher: Result<RemoteFetcher, String>,
    default_extract: ExtractType,
    match_mode: MatchMode,
}

enum FetchFailure {
    Error(String),
    Cancelled,
}

impl Evaluator {
    /// Build the evaluator from configuration.
    pub fn from_config(config: &Config) -> Self {
        let fetcher = RemoteFetcher::from_config(&config.fetch).map_err(|e| {
            log::warn!("remote queries unavailable: {e}");
            e.to_string()
        });
        Self {
            fetcher,
            default_extract: config.settings.default_extract_type,
            match_mode: config.search.match_mode,
        }
    }

    /// Override the configured match mode (e.g. from --match-mode CLI flag).
    pub fn set_match_mode(&mut self, mode: MatchMode) {
        self.match_mode = mode;
    }

    /// Evaluate an inject test request.
    pub async fn evaluate(&self, request: &InjectTestRequest) -> Verdict {
        self.evaluate_until(request, std::future::pending()).await
    }

    /// Evaluate a request, giving up on the remote query once `cancel`
    /// completes.
    pub async fn evaluate_until<F>(&self, request: &InjectTestRequest, cancel: F) -> Verdict
    where
        F: Future<Output = ()>,
    {
        let spec = match request.to_spec() {
            Ok(spec) => spec,
            Err(e) => {
                let mut debug = DebugTrace::default();
                debug.push("Invalid evaluation configuration", json!(e.to_string()));
                return Verdict::fail(debug);
            }
        };
        let ctx = EvaluationContext::seeded(&request.target_tool, &request.context);
        let input = EvaluationInput {
            test_data: &request.test_data,
            platform: request.platform(),
        };
        self.run(&spec, input, ctx, cancel).await
    }

    /// Evaluate an already validated spec, e.g. one loaded from a scenario.
    pub async fn run<F>(
        &self,
        spec: &InjectEvaluationSpec,
        input: EvaluationInput<'_>,
        mut ctx: EvaluationContext,
        cancel: F,
    ) -> Verdict
    where
        F: Future<Output = ()>,
    {
        let mut debug = DebugTrace::default();
        let check = RuleCheck {
            rules: &spec.parameters,
            default_extract: self.default_extract,
        };
        log::debug!(
            "evaluating {} with {} rule(s)",
            spec.evaluation_strategy.as_str(),
            spec.parameters.len()
        );

        let passed = match spec.evaluation_strategy {
            EvaluationStrategy::DataFiltering => {
                data_filtering::evaluate(&check, input.test_data, &mut ctx, &mut debug)
            }
            EvaluationStrategy::QuerySearch => {
                let dataset = match self.fetch(spec, input.platform, &ctx, cancel).await {
                    Ok(dataset) => dataset,
                    Err(FetchFailure::Error(e)) => {
                        log::warn!("query_search fetch failed: {e}");
                        debug.push("Error while fetching data", json!(e));
                        return Verdict::fail(debug);
                    }
                    Err(FetchFailure::Cancelled) => {
                        debug.push("Evaluation cancelled while fetching data", Value::Null);
                        return Verdict::fail(debug);
                    }
                };
                let mode = spec.evaluation_context.match_mode.unwrap_or(self.match_mode);
                query_search::evaluate(&check, &dataset, mode, &mut ctx, &mut debug)
            }
            EvaluationStrategy::QueryMirror => {
                debug.push(
                    "query_mirror evaluation is not implemented",
                    json!({"strategy": "query_mirror"}),
                );
                return Verdict {
                    outcome: Outcome::from_passed(query_mirror::evaluate()),
                    debug,
                };
            }
        };

        let outcome = Outcome::from_passed(passed);
        debug.push(
            "Evaluation result",
            json!({
                "outcome": outcome.label(),
                "rules": spec.parameters.len(),
                "score_range": spec.score_range,
            }),
        );
        Verdict { outcome, debug }
    }

    async fn fetch<F>(
        &self,
        spec: &InjectEvaluationSpec,
        platform: Option<RemotePlatform<'_>>,
        ctx: &EvaluationContext,
        cancel: F,
    ) -> Result<FetchedDataset, FetchFailure>
    where
        F: Future<Output = ()>,
    {
        let fetcher = self.fetcher.as_ref().map_err(|e| FetchFailure::Error(e.clone()))?;
        let platform = platform.ok_or_else(|| {
            FetchFailure::Error("no remote platform URL configured".to_string())
        })?;
        let query = spec
            .evaluation_context
            .query_context
            .clone()
            .unwrap_or_default();
        let url = ctx.render(&query.url);
        let payload = ctx.render_value(&query.payload);

        let request = fetcher.fetch(
            platform.url,
            platform.api_key,
            query.request_method,
            &url,
            &payload,
        );
        tokio::select! {
            result = request => result.map_err(|e| FetchFailure::Error(e.to_string())),
            () = cancel => {
                log::info!("evaluation cancelled during fetch of {url}");
                Err(FetchFailure::Cancelled)
            }
        }
    }
}
