//! Post-trial scoring.

use cogex_core::expr::strict_eq;
use cogex_core::trial::TRIAL_TYPE;
use cogex_core::{Error, EvalContext, TrialResult, TrialSpec};
use serde_json::Value;

use crate::presentation::{Capture, Presentation};

/// Strict equality between the expected key and the captured response. No
/// response is captured as the empty string, so a trial expecting no input
/// is correct exactly when nothing was pressed.
pub fn is_correct(expected: &Value, response: Option<&str>) -> bool {
    strict_eq(expected, &Value::from(response.unwrap_or("")))
}

/// Builds the result record for a finished trial. The expected key is
/// derived again from the trial definition against the same context the
/// trial was rendered with.
pub fn score(
    spec: &TrialSpec,
    ctx: &EvalContext<'_>,
    presentation: &Presentation,
    capture: &Capture,
    trial_index: usize,
    time_elapsed: u64,
) -> Result<TrialResult, Error> {
    let expected = spec.expected_response().evaluate(ctx)?;
    let correct = is_correct(&expected, capture.response.as_deref());

    Ok(TrialResult {
        trial_index,
        trial_type: TRIAL_TYPE.to_string(),
        stimulus: presentation.stimulus.clone(),
        response: capture.response.clone(),
        rt: capture.rt_ms,
        correct,
        time_elapsed,
        echo: presentation.echo(),
    })
}
