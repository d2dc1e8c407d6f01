use std::collections::BTreeMap;

use cogex_core::expr::display;
use cogex_core::trial::echo_key;
use cogex_core::{Error, EvalContext, TrialKind, TrialSpec};
use serde_json::Value;
use tracing::debug;

/// A trial with every dynamic parameter resolved, as handed to the
/// renderer at trial start.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub kind: TrialKind,
    pub duration_ms: Option<u64>,
    pub stimulus: String,
    pub choices: Vec<String>,
    pub correct_key: Value,
    pub response_ends_trial: bool,
    /// Resolved value of every rendering parameter, by unprefixed name.
    pub params: BTreeMap<String, Value>,
    /// Timeline variable fields logged with the result.
    pub fields: BTreeMap<String, Value>,
}

/// What the renderer captured: one key press or none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub response: Option<String>,
    pub rt_ms: Option<u64>,
}

impl Capture {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn key(key: impl Into<String>, rt_ms: u64) -> Self {
        Self {
            response: Some(key.into()),
            rt_ms: Some(rt_ms),
        }
    }
}

impl Presentation {
    pub fn resolve(spec: &TrialSpec, ctx: &EvalContext<'_>) -> Result<Self, Error> {
        let mut params = BTreeMap::new();
        for (name, expr) in spec.echo_params() {
            params.insert(name.to_string(), expr.evaluate(ctx)?);
        }

        let duration_ms = match &params["duration"] {
            Value::Null => None,
            value => Some(as_millis(value).ok_or_else(|| invalid("duration", value))?),
        };
        let choices = match &params["choices"] {
            Value::Array(keys) => keys
                .iter()
                .map(|k| k.as_str().map(str::to_string).ok_or_else(|| invalid("choices", k)))
                .collect::<Result<Vec<_>, _>>()?,
            value => return Err(invalid("choices", value)),
        };

        let fields = spec
            .echoed_fields(ctx.record.fields().map(|(name, _)| name.as_str()))
            .into_iter()
            .filter_map(|name| Some((name.to_string(), ctx.record.get(name)?.clone())))
            .collect();

        Ok(Self {
            kind: spec.kind,
            duration_ms,
            stimulus: display(&params["stimulus"]),
            choices,
            correct_key: params["correct_key"].clone(),
            response_ends_trial: cogex_core::expr::truthy(&params["response_ends_trial"]),
            params,
            fields,
        })
    }

    /// Namespaced copy of the rendering parameters and timeline fields for
    /// the result record.
    pub fn echo(&self) -> BTreeMap<String, Value> {
        self.fields
            .iter()
            .chain(&self.params)
            .map(|(name, value)| (echo_key(name), value.clone()))
            .collect()
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.choices.iter().any(|c| c.eq_ignore_ascii_case(key))
    }

    /// Drops key presses the trial would not have recorded: keys outside
    /// `choices`, and responses after the trial ended. Keys are compared and
    /// recorded lowercase.
    pub fn admit(&self, capture: Capture) -> Capture {
        let Some(key) = capture.response.as_deref() else {
            return Capture::none();
        };
        if key.is_empty() || !self.accepts(key) {
            debug!(key, "ignoring key outside choices");
            return Capture::none();
        }
        if let (Some(rt), Some(limit)) = (capture.rt_ms, self.duration_ms) {
            if rt > limit {
                debug!(rt, limit, "response arrived after trial ended");
                return Capture::none();
            }
        }
        Capture {
            response: Some(key.to_lowercase()),
            rt_ms: capture.rt_ms,
        }
    }

    /// Text rendering of the screen, e.g. `You see "RED" in "green" for
    /// 2000ms. You can press [F, J].`
    pub fn describe(&self) -> String {
        let mut out = String::from("You see ");
        let text = self.params.get("text");
        let shape = self.params.get("shape");
        let color = self.params.get("color").map(display).unwrap_or_default();
        if self.stimulus.is_empty() {
            out.push_str("a blank screen");
        } else if let Some(text) = text {
            out.push_str(&format!("\"{}\" in \"{}\"", display(text), color));
        } else if let Some(shape) = shape {
            out.push_str(&format!("a {} {}", color, display(shape)));
        } else {
            out.push_str(&format!("\"{}\"", strip_markup(&self.stimulus)));
        }
        if let Some(ms) = self.duration_ms {
            out.push_str(&format!(" for {ms}ms"));
        }
        out.push('.');
        if !self.choices.is_empty() {
            let keys: Vec<_> = self.choices.iter().map(|c| c.to_uppercase()).collect();
            out.push_str(&format!(" You can press [{}].", keys.join(", ")));
        }
        out
    }
}

fn as_millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.is_finite())
            .map(|f| f.round() as u64)
    })
}

fn invalid(name: &str, value: &Value) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.clone(),
    }
}

fn strip_markup(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
