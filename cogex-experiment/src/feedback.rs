//! Feedback selection from the outcome of an earlier trial.

use cogex_core::{Expr, StimulusTemplate, TrialKind, TrialResult, TrialSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackVariant {
    Correct,
    Wrong,
    TooSlow,
}

impl FeedbackVariant {
    /// Correct → green, incorrect with a key press → wrong, incorrect
    /// without one → too slow.
    pub fn select(previous: &TrialResult) -> Self {
        if previous.correct {
            FeedbackVariant::Correct
        } else if previous.responded() {
            FeedbackVariant::Wrong
        } else {
            FeedbackVariant::TooSlow
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackScreen {
    pub message: String,
    pub color: String,
}

impl FeedbackScreen {
    pub fn new(message: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackStyle {
    pub correct: FeedbackScreen,
    pub wrong: FeedbackScreen,
    pub too_slow: FeedbackScreen,
    /// How many trials back the scored trial is.
    pub window: usize,
}

impl Default for FeedbackStyle {
    fn default() -> Self {
        Self {
            correct: FeedbackScreen::new("Correct!", "green"),
            wrong: FeedbackScreen::new("Wrong!", "red"),
            too_slow: FeedbackScreen::new("Too slow!", "red"),
            window: 1,
        }
    }
}

impl FeedbackStyle {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn screen(&self, variant: FeedbackVariant) -> &FeedbackScreen {
        match variant {
            FeedbackVariant::Correct => &self.correct,
            FeedbackVariant::Wrong => &self.wrong,
            FeedbackVariant::TooSlow => &self.too_slow,
        }
    }

    /// The selection rule as a derivation, for trials evaluated at
    /// presentation time.
    fn select_expr(&self, pick: impl Fn(&FeedbackScreen) -> &str) -> Expr {
        Expr::if_else(
            Expr::bean("correct", self.window),
            pick(&self.correct),
            Expr::if_else(
                Expr::data("response", self.window),
                pick(&self.wrong),
                pick(&self.too_slow),
            ),
        )
    }

    pub fn message_expr(&self) -> Expr {
        self.select_expr(|s| s.message.as_str())
    }

    pub fn color_expr(&self) -> Expr {
        self.select_expr(|s| s.color.as_str())
    }

    pub fn trial(&self, duration_ms: u64) -> TrialSpec {
        TrialSpec::new(
            TrialKind::FeedbackDisplay,
            StimulusTemplate::text(self.message_expr(), self.color_expr()),
        )
        .with_duration(duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::Presentation;
    use cogex_core::trial::TRIAL_TYPE;
    use cogex_core::{EvalContext, SharedState, TimelineVariableRecord};
    use serde_json::json;

    fn result(response: Option<&str>, correct: bool) -> TrialResult {
        TrialResult {
            trial_index: 0,
            trial_type: TRIAL_TYPE.into(),
            stimulus: String::new(),
            response: response.map(str::to_string),
            rt: response.map(|_| 350),
            correct,
            time_elapsed: 350,
            echo: Default::default(),
        }
    }

    #[test]
    fn selects_three_variants() {
        assert_eq!(FeedbackVariant::select(&result(Some("j"), true)), FeedbackVariant::Correct);
        assert_eq!(FeedbackVariant::select(&result(Some("f"), false)), FeedbackVariant::Wrong);
        assert_eq!(FeedbackVariant::select(&result(None, false)), FeedbackVariant::TooSlow);
        assert_eq!(FeedbackVariant::select(&result(Some(""), false)), FeedbackVariant::TooSlow);
    }

    #[test]
    fn derivation_agrees_with_selector() {
        let style = FeedbackStyle::default();
        let trial = style.trial(800);
        let record = TimelineVariableRecord::new();
        let shared = SharedState::new();

        for previous in [
            result(Some("j"), true),
            result(Some("f"), false),
            result(None, false),
        ] {
            let history = [previous];
            let ctx = EvalContext::new(&record, &history, &shared);
            let shown = Presentation::resolve(&trial, &ctx).unwrap();
            let expected = style.screen(FeedbackVariant::select(&history[0]));

            assert_eq!(shown.params["text"], json!(expected.message));
            assert_eq!(shown.params["color"], json!(expected.color));
        }
    }

    #[test]
    fn window_reaches_further_back() {
        let style = FeedbackStyle::default().with_window(2);
        let trial = style.trial(800);
        let record = TimelineVariableRecord::new();
        let shared = SharedState::new();
        let history = [result(Some("f"), false), result(None, true)];
        let ctx = EvalContext::new(&record, &history, &shared);

        let shown = Presentation::resolve(&trial, &ctx).unwrap();
        assert_eq!(shown.params["text"], json!("Wrong!"));
        assert_eq!(shown.kind, TrialKind::FeedbackDisplay);
    }
}
