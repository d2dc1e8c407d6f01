use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

const JSPSYCH_CDN: &str = "https://unpkg.com/jspsych@7.3.1";
const KEYBOARD_PLUGIN_CDN: &str = "https://unpkg.com/@jspsych/plugin-html-keyboard-response@1.1.2";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Standalone page loading jsPsych from a CDN.
    #[default]
    Html,
    /// Plain script for a page that already loads jsPsych and the plugin.
    Script,
    /// `runExperiment()` for embedding in a host application.
    Function,
}

/// Where the browser stores the data when the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Json(String),
    Csv(String),
}

impl SaveTarget {
    pub fn from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(SaveTarget::Json(path.to_string())),
            Some("csv") => Ok(SaveTarget::Csv(path.to_string())),
            _ => Err(CompileError::UnsupportedSaveFormat(path.to_string())),
        }
    }

    pub fn format(&self) -> &'static str {
        match self {
            SaveTarget::Json(_) => "json",
            SaveTarget::Csv(_) => "csv",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            SaveTarget::Json(path) | SaveTarget::Csv(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub format: OutputFormat,
    /// Only affects [`OutputFormat::Function`]: an async function awaits the
    /// run and resolves to the collected data.
    pub is_async: bool,
    pub save: Option<SaveTarget>,
    pub title: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Html,
            is_async: true,
            save: None,
            title: "Experiment".to_string(),
        }
    }
}

pub(crate) fn render(options: &CompileOptions, program: &str) -> String {
    match options.format {
        OutputFormat::Script => format!("{program}jsPsych.run(trials);\n"),
        OutputFormat::Function => function(options.is_async, program),
        OutputFormat::Html => html(&options.title, program),
    }
}

fn function(is_async: bool, program: &str) -> String {
    let body: String = program.lines().map(|line| format!("  {line}\n")).collect();
    if is_async {
        format!(
            "async function runExperiment() {{\n  document.body.style.backgroundColor='black';\n{body}  await jsPsych.run(trials);\n  return jsPsych.data.get();\n}}\n"
        )
    } else {
        format!(
            "function runExperiment() {{\n  document.body.style.backgroundColor='black';\n{body}  jsPsych.run(trials);\n}}\n"
        )
    }
}

fn html(title: &str, program: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{JSPSYCH_CDN}"></script>
<script src="{KEYBOARD_PLUGIN_CDN}"></script>
<link href="{JSPSYCH_CDN}/css/jspsych.css" rel="stylesheet" type="text/css"/>
<style>body {{ background: #000; color: #FFF; }}</style>
</head>
<body></body>
<script>
{program}jsPsych.run(trials);
</script>
</html>
"#,
        title = escape_html(title)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
