use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;
use crate::stimulus::StimulusTemplate;

/// Namespace for trial parameters echoed into the result record.
pub const ECHO_PREFIX: &str = "bean_";

/// Plugin name the browser runner records as `trial_type`.
pub const TRIAL_TYPE: &str = "html-keyboard-response";

pub fn echo_key(name: &str) -> String {
    format!("{ECHO_PREFIX}{name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialKind {
    FixationDisplay,
    StimulusDisplay,
    ResponseCollection,
    FeedbackDisplay,
}

impl TrialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialKind::FixationDisplay => "fixation_display",
            TrialKind::StimulusDisplay => "stimulus_display",
            TrialKind::ResponseCollection => "response_collection",
            TrialKind::FeedbackDisplay => "feedback_display",
        }
    }
}

/// Assignment to a shared variable applied after the trial is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffect {
    pub target: String,
    pub value: Expr,
}

/// One trial template. Every parameter is a derivation, literal or not, and
/// is evaluated fresh each time the trial is presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub kind: TrialKind,
    /// Milliseconds; absent means the trial waits for a response.
    #[serde(default)]
    pub duration: Option<Expr>,
    #[serde(default = "blank")]
    pub stimulus: StimulusTemplate,
    #[serde(default = "no_keys")]
    pub choices: Expr,
    /// Absent means no input is expected.
    #[serde(default)]
    pub correct_key: Option<Expr>,
    #[serde(default = "ends_trial")]
    pub response_ends_trial: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<SideEffect>,
}

fn blank() -> StimulusTemplate {
    StimulusTemplate::Blank
}

fn no_keys() -> Expr {
    Expr::lit(Value::Array(Vec::new()))
}

fn ends_trial() -> Expr {
    Expr::lit(true)
}

impl TrialSpec {
    pub fn new(kind: TrialKind, stimulus: StimulusTemplate) -> Self {
        Self {
            kind,
            duration: None,
            stimulus,
            choices: no_keys(),
            correct_key: None,
            response_ends_trial: ends_trial(),
            side_effects: Vec::new(),
        }
    }

    /// White cross in the middle of the screen.
    pub fn fixation(duration_ms: u64) -> Self {
        Self::new(TrialKind::FixationDisplay, StimulusTemplate::text("+", "white"))
            .with_duration(duration_ms)
    }

    pub fn blank(duration_ms: u64) -> Self {
        Self::new(TrialKind::StimulusDisplay, StimulusTemplate::Blank).with_duration(duration_ms)
    }

    pub fn stimulus(stimulus: StimulusTemplate) -> Self {
        Self::new(TrialKind::StimulusDisplay, stimulus)
    }

    pub fn response<K: Into<Value>>(
        stimulus: StimulusTemplate,
        choices: impl IntoIterator<Item = K>,
        correct_key: impl Into<Expr>,
    ) -> Self {
        Self::new(TrialKind::ResponseCollection, stimulus)
            .with_choices(Expr::lit(Value::Array(
                choices.into_iter().map(Into::into).collect(),
            )))
            .with_correct_key(correct_key)
    }

    pub fn with_duration(mut self, duration: impl Into<Expr>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_choices(mut self, choices: Expr) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_correct_key(mut self, key: impl Into<Expr>) -> Self {
        self.correct_key = Some(key.into());
        self
    }

    pub fn with_response_ends_trial(mut self, ends: impl Into<Expr>) -> Self {
        self.response_ends_trial = ends.into();
        self
    }

    pub fn with_side_effect(mut self, target: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.side_effects.push(SideEffect {
            target: target.into(),
            value: value.into(),
        });
        self
    }

    /// Derivation of the key the subject is expected to press; the empty
    /// string when no input is expected.
    pub fn expected_response(&self) -> Expr {
        self.correct_key.clone().unwrap_or_else(|| Expr::lit(""))
    }

    /// Every rendering parameter by name. Both the evaluator and the compiler
    /// echo exactly this list, so logged values cannot drift from the
    /// rendered ones.
    pub fn echo_params(&self) -> Vec<(&'static str, Expr)> {
        let mut params = vec![
            ("kind", Expr::lit(self.kind.as_str())),
            (
                "duration",
                self.duration.clone().unwrap_or(Expr::Literal(Value::Null)),
            ),
            ("stimulus", self.stimulus.markup()),
            ("choices", self.choices.clone()),
            ("correct_key", self.expected_response()),
            ("response_ends_trial", self.response_ends_trial.clone()),
        ];
        params.extend(
            self.stimulus
                .parts()
                .into_iter()
                .map(|(name, expr)| (name, expr.clone())),
        );
        params
    }

    /// Timeline variable fields echoed next to the rendering parameters.
    /// Fields named like a parameter, a side effect target or the scoring
    /// outcome are left out.
    pub fn echoed_fields<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let params = self.echo_params();
        names
            .into_iter()
            .filter(|name| {
                *name != "correct"
                    && !params.iter().any(|(param, _)| param == name)
                    && !self.side_effects.iter().any(|s| s.target == *name)
            })
            .collect()
    }

    /// First key read from the trial's own data outside a side effect. The
    /// current record only exists once the trial has finished.
    pub fn current_data_read(&self) -> Option<String> {
        let mut found = None;
        for (_, expr) in self.echo_params() {
            expr.visit(&mut |e| {
                if let Expr::Data { key, window: 0 } = e {
                    found.get_or_insert_with(|| key.clone());
                }
            });
        }
        found
    }

    fn exprs(&self) -> impl Iterator<Item = Expr> + '_ {
        self.echo_params()
            .into_iter()
            .map(|(_, e)| e)
            .chain(self.side_effects.iter().map(|s| s.value.clone()))
    }

    pub fn timeline_names(&self) -> BTreeSet<String> {
        self.exprs()
            .flat_map(|e| {
                e.timeline_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn shared_names(&self) -> BTreeSet<String> {
        self.exprs()
            .flat_map(|e| {
                e.shared_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .chain(self.side_effects.iter().map(|s| s.target.clone()))
            .collect()
    }
}

/// Recorded result per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub trial_type: String,
    pub stimulus: String,
    pub response: Option<String>,
    pub rt: Option<u64>,
    #[serde(rename = "bean_correct")]
    pub correct: bool,
    pub time_elapsed: u64,
    /// Namespaced copy of the rendering parameters.
    #[serde(flatten)]
    pub echo: BTreeMap<String, Value>,
}

impl TrialResult {
    /// Field lookup by record key, as the browser runner's data store sees
    /// it. Missing keys are undefined.
    pub fn field(&self, key: &str) -> Value {
        match key {
            "trial_index" => Value::from(self.trial_index),
            "trial_type" => Value::from(self.trial_type.as_str()),
            "stimulus" => Value::from(self.stimulus.as_str()),
            "response" => self.response.clone().map(Value::from).unwrap_or(Value::Null),
            "rt" => self.rt.map(Value::from).unwrap_or(Value::Null),
            "bean_correct" => Value::Bool(self.correct),
            "time_elapsed" => Value::from(self.time_elapsed),
            other => self.echo.get(other).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn echoed(&self, name: &str) -> Option<&Value> {
        self.echo.get(&echo_key(name))
    }

    pub fn responded(&self) -> bool {
        self.response.as_deref().is_some_and(|r| !r.is_empty())
    }
}
