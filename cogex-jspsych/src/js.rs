//! JavaScript emission for literals and derivations.

use std::fmt::Write;

use cogex_core::Expr;
use serde_json::Value;

/// A JavaScript literal for `value`. Strings are safe to inline inside a
/// `<script>` element.
pub fn literal(value: &Value) -> String {
    let mut out = String::new();
    write_literal(&mut out, value);
    out
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_literal(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push('{');
            for (i, (key, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_literal(out, item);
            }
            out.push('}');
        }
    }
}

pub fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(&mut out, s);
    out
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // `</script>` and `<!--` must not appear verbatim.
            '<' => out.push_str("\\u003c"),
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// The derivation as a JavaScript expression, valid inside `on_start` and
/// `on_finish` callbacks.
pub fn emit(expr: &Expr) -> String {
    match expr {
        // Unmatched lookups and missing fields are undefined, not null.
        Expr::Literal(Value::Null) => "undefined".to_string(),
        Expr::Literal(value) => literal(value),
        // Immediate lookup so the value also resolves inside `on_finish`.
        Expr::Timeline(name) => format!("jsPsych.timelineVariable({},true)", string(name)),
        // Only valid in `on_finish`, where `data` is the finished trial.
        Expr::Data { key, window: 0 } => format!("data[{}]", string(key)),
        Expr::Data { key, window } => format!(
            "jsPsych.data.get().last({window}).values()[0][{}]",
            string(key)
        ),
        Expr::Shared(name) => name.clone(),
        Expr::Eq(a, b) => format!("({}==={})", emit(a), emit(b)),
        Expr::Not(a) => format!("(!{})", emit(a)),
        Expr::Add(a, b) => format!("({}+{})", emit(a), emit(b)),
        Expr::If {
            cond,
            then,
            otherwise,
        } => format!("({}?{}:{})", emit(cond), emit(then), emit(otherwise)),
        Expr::Lookup { key, cases } => {
            let mut out = String::from("((__bean_k)=>{switch(__bean_k){");
            for case in cases {
                let _ = write!(out, "case {}:return {};", literal(&case.when), emit(&case.then));
            }
            let _ = write!(out, "}}}})({})", emit(key));
            out
        }
        Expr::Concat(parts) => {
            let parts: Vec<String> = parts.iter().map(emit).collect();
            format!("[{}].join('')", parts.join(","))
        }
        Expr::Repeat { value, times } => format!("[{}].join('').repeat({times})", emit(value)),
    }
}
