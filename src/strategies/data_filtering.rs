//! `data_filtering`: every rule must hold on the payload supplied with the request.

use serde_json::Value;

use super::RuleCheck;
use crate::eval::{DebugTrace, EvaluationContext};

/// Evaluate the rules against `data`. No rules is a pass.
pub fn evaluate(
    check: &RuleCheck<'_>,
    data: &Value,
    ctx: &mut EvaluationContext,
    trace: &mut DebugTrace,
) -> bool {
    check.run(data, None, ctx, trace)
}
