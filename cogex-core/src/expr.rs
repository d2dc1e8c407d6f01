//! Parameter derivations.
//!
//! A trial parameter is either a literal or a zero-argument derivation that
//! is evaluated when the trial is presented. Derivations are a small closed
//! expression tree so the same definition can be evaluated here and emitted
//! as JavaScript by the compiler.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::timeline::TimelineVariableRecord;
use crate::trial::{TrialResult, echo_key};

/// Current values of the experiment-wide shared variables.
pub type SharedState = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    /// Field of the current timeline variable record.
    Timeline(String),
    /// Field of a previously recorded trial, `window` trials back.
    Data {
        key: String,
        #[serde(default = "default_window")]
        window: usize,
    },
    Shared(String),
    Eq(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Selects the first case whose `when` equals the key. No match yields
    /// undefined (`Value::Null`).
    Lookup { key: Box<Expr>, cases: Vec<Case> },
    Concat(Vec<Expr>),
    Repeat { value: Box<Expr>, times: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub when: Value,
    pub then: Expr,
}

fn default_window() -> usize {
    1
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn timeline(name: impl Into<String>) -> Self {
        Expr::Timeline(name.into())
    }

    pub fn data(key: impl Into<String>, window: usize) -> Self {
        Expr::Data {
            key: key.into(),
            window,
        }
    }

    /// A namespaced parameter echoed by an earlier trial.
    pub fn bean(name: &str, window: usize) -> Self {
        Expr::data(echo_key(name), window)
    }

    pub fn shared(name: impl Into<String>) -> Self {
        Expr::Shared(name.into())
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        Expr::Eq(Box::new(self), Box::new(other.into()))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn add(self, other: impl Into<Expr>) -> Self {
        Expr::Add(Box::new(self), Box::new(other.into()))
    }

    pub fn if_else(cond: Expr, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then: Box::new(then.into()),
            otherwise: Box::new(otherwise.into()),
        }
    }

    pub fn lookup<W, T>(key: Expr, cases: impl IntoIterator<Item = (W, T)>) -> Self
    where
        W: Into<Value>,
        T: Into<Expr>,
    {
        Expr::Lookup {
            key: Box::new(key),
            cases: cases
                .into_iter()
                .map(|(when, then)| Case {
                    when: when.into(),
                    then: then.into(),
                })
                .collect(),
        }
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Concat(parts.into_iter().collect())
    }

    pub fn repeat(value: impl Into<Expr>, times: usize) -> Self {
        Expr::Repeat {
            value: Box::new(value.into()),
            times,
        }
    }

    /// Evaluates the derivation against the current experiment state.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Timeline(name) => ctx
                .record
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownTimelineVariable(name.clone())),
            Expr::Data { key, window } => ctx.data(key, *window),
            Expr::Shared(name) => ctx
                .shared
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownSharedVariable(name.clone())),
            Expr::Eq(a, b) => Ok(Value::Bool(strict_eq(
                &a.evaluate(ctx)?,
                &b.evaluate(ctx)?,
            ))),
            Expr::Not(a) => Ok(Value::Bool(!truthy(&a.evaluate(ctx)?))),
            Expr::Add(a, b) => Ok(add(&a.evaluate(ctx)?, &b.evaluate(ctx)?)),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&cond.evaluate(ctx)?) {
                    then.evaluate(ctx)
                } else {
                    otherwise.evaluate(ctx)
                }
            }
            Expr::Lookup { key, cases } => {
                let key = key.evaluate(ctx)?;
                match cases.iter().find(|case| strict_eq(&case.when, &key)) {
                    Some(case) => case.then.evaluate(ctx),
                    None => {
                        warn!(%key, "lookup has no matching case, evaluating to undefined");
                        Ok(Value::Null)
                    }
                }
            }
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&display(&part.evaluate(ctx)?));
                }
                Ok(Value::String(out))
            }
            Expr::Repeat { value, times } => {
                Ok(Value::String(display(&value.evaluate(ctx)?).repeat(*times)))
            }
        }
    }

    /// Calls `f` on this node and every node below it.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Timeline(_) | Expr::Data { .. } | Expr::Shared(_) => {}
            Expr::Eq(a, b) | Expr::Add(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Not(a) => a.visit(f),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                cond.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::Lookup { key, cases } => {
                key.visit(f);
                for case in cases {
                    case.then.visit(f);
                }
            }
            Expr::Concat(parts) => {
                for part in parts {
                    part.visit(f);
                }
            }
            Expr::Repeat { value, .. } => value.visit(f),
        }
    }

    pub fn timeline_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Timeline(name) = e {
                names.insert(name.as_str());
            }
        });
        names
    }

    pub fn shared_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Shared(name) = e {
                names.insert(name.as_str());
            }
        });
        names
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::lit(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::lit(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::lit(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::lit(value)
    }
}

impl From<u64> for Expr {
    fn from(value: u64) -> Self {
        Expr::lit(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::lit(value)
    }
}

/// What a derivation can see while a trial is being presented.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub record: &'a TimelineVariableRecord,
    pub history: &'a [TrialResult],
    pub shared: &'a SharedState,
    /// Result of the trial being finished, visible as the newest entry while
    /// side effects run.
    pub current: Option<&'a TrialResult>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        record: &'a TimelineVariableRecord,
        history: &'a [TrialResult],
        shared: &'a SharedState,
    ) -> Self {
        Self {
            record,
            history,
            shared,
            current: None,
        }
    }

    pub fn with_current(mut self, current: &'a TrialResult) -> Self {
        self.current = Some(current);
        self
    }

    /// Field of a recorded trial `window` trials back. Window 0 is the trial
    /// being finished and only exists while side effects run.
    pub fn data(&self, key: &str, window: usize) -> Result<Value> {
        let available = self.history.len() + usize::from(self.current.is_some());
        match (window, self.current) {
            (0 | 1, Some(current)) => Ok(current.field(key)),
            (0, None) => Err(Error::DataWindow { window, available }),
            _ if window > available => Err(Error::DataWindow { window, available }),
            _ => Ok(self.history[available - window].field(key)),
        }
    }
}

/// JavaScript truthiness; `Null` stands in for both null and undefined.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `===` on primitives. Arrays and objects never compare equal, as they
/// would not by reference in the browser.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(_), _) | (Value::Object(_), _) => false,
        _ => a == b,
    }
}

/// String form used when values are joined into markup.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn display_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// `+` with browser coercions. `Null` is undefined: it reads as
/// `"undefined"` next to a string and makes arithmetic NaN, which has no
/// JSON form and comes back as `Null`.
fn add(a: &Value, b: &Value) -> Value {
    if a.is_string() || b.is_string() {
        return Value::String(concat_operand(a) + &concat_operand(b));
    }
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    Number::from_f64(as_float(a) + as_float(b))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn concat_operand(value: &Value) -> String {
    match value {
        Value::Null => "undefined".to_string(),
        value => display(value),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
