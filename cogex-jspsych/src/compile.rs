use std::collections::BTreeSet;
use std::fmt::Write;

use cogex_core::trial::echo_key;
use cogex_core::{
    Block, EvalContext, Experiment, Expr, SharedState, TimelineVariableRecord, TrialSpec,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::js::{emit, literal, string};
use crate::page::{self, CompileOptions};

/// Plugin parameter each echoed rendering parameter is passed as.
const PLUGIN_PARAMS: &[(&str, &str)] = &[
    ("duration", "trial_duration"),
    ("stimulus", "stimulus"),
    ("choices", "choices"),
    ("response_ends_trial", "response_ends_trial"),
];

/// Validates the experiment and emits it in the requested output format.
pub fn compile(experiment: &Experiment, options: &CompileOptions) -> Result<String> {
    experiment.validate()?;
    let program = program_js(experiment, options);
    info!(
        blocks = experiment.blocks.len(),
        format = ?options.format,
        bytes = program.len(),
        "compiled experiment"
    );
    Ok(page::render(options, &program))
}

/// Shared variables, runner setup and the top-level timeline. The final
/// `run` call is left to the output format.
pub(crate) fn program_js(experiment: &Experiment, options: &CompileOptions) -> String {
    let mut out = String::new();
    for variable in &experiment.shared {
        let _ = writeln!(out, "let {}={};", variable.name, literal(&variable.initial));
    }

    out.push_str("const jsPsych=initJsPsych({");
    if let Some(save) = &options.save {
        let _ = write!(
            out,
            "on_finish:()=>{{jsPsych.data.get().localSave({},{});}}",
            string(save.format()),
            string(save.path())
        );
    }
    out.push_str("});\n");

    out.push_str("const trials=[\n");
    for block in &experiment.blocks {
        out.push_str(&block_js(block));
        out.push_str(",\n");
    }
    out.push_str("];\n");
    out
}

/// A block as a nested jsPsych timeline over its variable table.
pub fn block_js(block: &Block) -> String {
    let fields: BTreeSet<&str> = block
        .timeline
        .iter()
        .flat_map(|record| record.fields().map(|(name, _)| name.as_str()))
        .collect();
    let fields: Vec<&str> = fields.into_iter().collect();
    let trials: Vec<String> = block
        .trials
        .iter()
        .map(|trial| trial_js(trial, &fields))
        .collect();
    let mut out = format!("{{timeline:[\n{}\n]", trials.join(",\n"));
    if !block.timeline.is_empty() {
        let table: Vec<Value> = block
            .timeline
            .iter()
            .map(|record| Value::Object(record.as_map().clone()))
            .collect();
        let _ = write!(out, ",\ntimeline_variables:{}", literal(&Value::Array(table)));
    }
    if block.randomize_order {
        out.push_str(",\nrandomize_order:true");
    }
    if block.repetitions != 1 {
        let _ = write!(out, ",\nrepetitions:{}", block.repetitions);
    }
    out.push('}');
    debug!(
        name = block.name.as_deref().unwrap_or(""),
        trials = block.trials.len(),
        records = block.timeline.len(),
        "compiled block"
    );
    out
}

/// One trial of the keyboard response plugin. Every rendering parameter is
/// passed to the plugin and echoed into `data` from the same derivation,
/// together with the timeline variables named in `fields`; `on_finish`
/// scores the response and applies side effects.
pub fn trial_js(trial: &TrialSpec, fields: &[&str]) -> String {
    let params = trial.echo_params();
    let mut out = String::from("{type:jsPsychHtmlKeyboardResponse");

    for (name, plugin) in PLUGIN_PARAMS {
        let Some((_, expr)) = params.iter().find(|(n, _)| n == name) else {
            continue;
        };
        let value = if *name == "choices" {
            choices_js(expr)
        } else {
            param_js(expr)
        };
        let _ = write!(out, ",\n{plugin}:{value}");
    }

    let echo: Vec<String> = trial
        .echoed_fields(fields.iter().copied())
        .into_iter()
        .map(|name| (name, Expr::timeline(name)))
        .chain(params.iter().map(|(name, expr)| (*name, expr.clone())))
        .map(|(name, expr)| format!("{}:{}", string(&echo_key(name)), param_js(&expr)))
        .collect();
    let _ = write!(out, ",\ndata:{{{}}}", echo.join(","));

    let correct = echo_key("correct");
    let _ = write!(
        out,
        ",\non_finish:(data)=>{{data[{}]=data[{}]===(data[\"response\"]??\"\");",
        string(&correct),
        string(&echo_key("correct_key"))
    );
    for effect in &trial.side_effects {
        let _ = write!(
            out,
            "{}={};data[{}]={};",
            effect.target,
            emit(&effect.value),
            string(&echo_key(&effect.target)),
            effect.target
        );
    }
    out.push_str("}}");
    out
}

/// Value of a derivation that reads neither the timeline, the data store,
/// nor shared variables.
fn constant(expr: &Expr) -> Option<Value> {
    if let Expr::Literal(value) = expr {
        return Some(value.clone());
    }
    let record = TimelineVariableRecord::new();
    let shared = SharedState::new();
    expr.evaluate(&EvalContext::new(&record, &[], &shared)).ok()
}

/// Constants are inlined; anything else is evaluated when the trial starts.
fn param_js(expr: &Expr) -> String {
    match constant(expr) {
        Some(value) => literal(&value),
        None => format!("()=>({})", emit(expr)),
    }
}

/// An empty key list disables the keyboard.
fn choices_js(expr: &Expr) -> String {
    match constant(expr) {
        Some(Value::Array(keys)) if keys.is_empty() => string("NO_KEYS"),
        Some(value) => literal(&value),
        None => format!(
            "()=>{{const __bean_keys={};return __bean_keys.length?__bean_keys:\"NO_KEYS\";}}",
            emit(expr)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{OutputFormat, SaveTarget};
    use cogex_core::{StimulusTemplate, TimelineTable};

    fn stroop() -> TrialSpec {
        TrialSpec::response(
            StimulusTemplate::text(Expr::timeline("word"), Expr::timeline("color")),
            ["f", "j"],
            Expr::timeline("correct"),
        )
        .with_duration(2000u64)
    }

    fn stroop_block() -> Block {
        Block::new(
            vec![TrialSpec::fixation(500), stroop()],
            TimelineTable::new(vec![
                TimelineVariableRecord::new()
                    .with("word", "RED")
                    .with("color", "green")
                    .with("correct", "j"),
            ]),
        )
    }

    #[test]
    fn trial_echoes_every_rendering_parameter() {
        let trial = stroop();
        let js = trial_js(&trial, &[]);

        for (name, _) in trial.echo_params() {
            assert!(js.contains(&format!("\"bean_{name}\":")), "missing echo of {name}");
        }
        assert!(js.starts_with("{type:jsPsychHtmlKeyboardResponse"));
        assert!(js.contains("\ntrial_duration:2000"));
        assert!(js.contains("\nchoices:[\"f\",\"j\"]"));
        assert!(js.contains("\"bean_text\":()=>(jsPsych.timelineVariable(\"word\",true))"));
        assert!(js.contains(
            r#"data["bean_correct"]=data["bean_correct_key"]===(data["response"]??"");"#
        ));
    }

    #[test]
    fn passive_trial_disables_keyboard() {
        let js = trial_js(&TrialSpec::fixation(500), &[]);

        assert!(js.contains("\nchoices:\"NO_KEYS\""));
        assert!(js.contains("\"bean_correct_key\":\"\""));
        assert!(js.contains("\"bean_stimulus\":\"\\u003cdiv style='color:white'>+\\u003c/div>\""));
    }

    #[test]
    fn timeline_fields_are_echoed_unless_shadowed() {
        let js = trial_js(&stroop(), &["color", "congruency", "correct", "word"]);

        assert!(js.contains(r#""bean_congruency":()=>(jsPsych.timelineVariable("congruency",true))"#));
        assert!(js.contains(r#""bean_word":()=>(jsPsych.timelineVariable("word",true))"#));
        assert!(!js.contains(r#""bean_correct":"#));
        assert_eq!(js.matches(r#""bean_color":"#).count(), 1);
    }

    #[test]
    fn dynamic_choices_use_internal_binding() {
        let trial = stroop().with_choices(Expr::shared("keys"));
        let js = trial_js(&trial, &[]);

        assert!(js.contains(
            r#"choices:()=>{const __bean_keys=keys;return __bean_keys.length?__bean_keys:"NO_KEYS";}"#
        ));
    }

    #[test]
    fn side_effects_assign_then_echo() {
        let trial = stroop().with_side_effect("score", Expr::shared("score").add(1));
        let js = trial_js(&trial, &[]);

        assert!(js.ends_with(r#"score=(score+1);data["bean_score"]=score;}}"#));
    }

    #[test]
    fn side_effect_reads_finished_trial_from_callback_data() {
        let streak = Expr::if_else(Expr::bean("correct", 0), Expr::shared("streak").add(1), 0);
        let js = trial_js(&stroop().with_side_effect("streak", streak), &[]);

        assert!(js.contains(r#"streak=(data["bean_correct"]?(streak+1):0);"#));
    }

    #[test]
    fn block_flags_are_emitted_only_when_set() {
        let plain = block_js(&Block::new(vec![TrialSpec::fixation(500)], TimelineTable::default()));
        assert!(!plain.contains("timeline_variables"));
        assert!(!plain.contains("randomize_order"));
        assert!(!plain.contains("repetitions"));

        let block = stroop_block().randomized().repeated(3);
        let js = block_js(&block);
        assert!(js.contains(
            r#"timeline_variables:[{"color":"green","correct":"j","word":"RED"}]"#
        ));
        assert!(js.contains("randomize_order:true"));
        assert!(js.contains(r#""bean_word":()=>(jsPsych.timelineVariable("word",true))"#));
        assert!(js.contains("repetitions:3"));
    }

    #[test]
    fn program_declares_shared_variables_and_save() {
        let experiment = Experiment::new(vec![stroop_block()]).with_shared("score", 0);
        let options = CompileOptions {
            format: OutputFormat::Script,
            save: Some(SaveTarget::from_path("out/data.csv").unwrap()),
            ..CompileOptions::default()
        };

        let js = compile(&experiment, &options).unwrap();
        assert!(js.starts_with("let score=0;\n"));
        assert!(js.contains(r#"localSave("csv","out/data.csv")"#));
        assert!(js.trim_end().ends_with("jsPsych.run(trials);"));
    }

    #[test]
    fn invalid_experiment_does_not_compile() {
        let trial = TrialSpec::blank(100).with_side_effect("score", 1);
        let experiment = Experiment::new(vec![Block::new(vec![trial], TimelineTable::default())]);

        assert!(matches!(
            compile(&experiment, &CompileOptions::default()),
            Err(crate::CompileError::Invalid(cogex_core::Error::UnknownSharedVariable(_)))
        ));
    }
}
