use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Block;
use crate::error::{Error, Result};
use crate::expr::SharedState;

/// Experiment-wide variable that trials read and update through side
/// effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedVariable {
    pub name: String,
    pub initial: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared: Vec<SharedVariable>,
    pub blocks: Vec<Block>,
}

impl Experiment {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            shared: Vec::new(),
            blocks,
        }
    }

    pub fn with_shared(mut self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.shared.push(SharedVariable {
            name: name.into(),
            initial: initial.into(),
        });
        self
    }

    pub fn initial_state(&self) -> SharedState {
        self.shared
            .iter()
            .map(|v| (v.name.clone(), v.initial.clone()))
            .collect()
    }

    pub fn trial_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.trials.len() * b.records().len() * b.repetitions)
            .sum()
    }

    pub fn validate(&self) -> Result<()> {
        let mut declared = HashSet::new();
        for variable in &self.shared {
            if !is_identifier(&variable.name) {
                return Err(Error::InvalidIdentifier(variable.name.clone()));
            }
            if !declared.insert(variable.name.as_str()) {
                return Err(Error::DuplicateSharedVariable(variable.name.clone()));
            }
        }
        for (index, block) in self.blocks.iter().enumerate() {
            block.validate(index)?;
            for trial in &block.trials {
                if let Some(name) = trial
                    .shared_names()
                    .into_iter()
                    .find(|n| !declared.contains(n.as_str()))
                {
                    return Err(Error::UnknownSharedVariable(name));
                }
            }
        }
        Ok(())
    }

    /// Block by name, or by position when no block has that name.
    pub fn block_mut(&mut self, selector: &str) -> Result<&mut Block> {
        let position = self
            .blocks
            .iter()
            .position(|b| b.name.as_deref() == Some(selector))
            .or_else(|| selector.parse::<usize>().ok().filter(|i| *i < self.blocks.len()));
        match position {
            Some(index) => Ok(&mut self.blocks[index]),
            None => Err(Error::UnknownBlock(selector.to_string())),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

const RESERVED: &[&str] = &[
    // Language keywords and literals.
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
    "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with",
    "yield", "arguments", "eval", "undefined", "NaN", "Infinity",
    // Names the compiled program binds.
    "bean", "data", "trial", "trials", "jsPsych", "initJsPsych", "jsPsychHtmlKeyboardResponse",
];

/// Prefix of helper bindings inside compiled derivations.
pub const INTERNAL_PREFIX: &str = "__bean";

/// Shared variables become top-level `let` bindings in compiled programs.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    head_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name)
        && !name.starts_with(INTERNAL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::timeline::TimelineTable;
    use crate::trial::TrialSpec;
    use serde_json::json;

    fn scoring_block() -> Block {
        Block::new(
            vec![TrialSpec::blank(100).with_side_effect("score", Expr::shared("score").add(1))],
            TimelineTable::default(),
        )
    }

    #[test]
    fn undeclared_shared_variable_is_rejected() {
        let experiment = Experiment::new(vec![scoring_block()]);
        assert!(matches!(
            experiment.validate(),
            Err(Error::UnknownSharedVariable(name)) if name == "score"
        ));

        let experiment = experiment.with_shared("score", 0);
        assert!(experiment.validate().is_ok());
        assert_eq!(experiment.initial_state()["score"], json!(0));
    }

    #[test]
    fn shared_names_must_be_identifiers() {
        assert!(is_identifier("score_2"));
        assert!(!is_identifier("2score"));
        assert!(!is_identifier("let"));
        assert!(!is_identifier(""));
        for name in [
            "enum", "await", "undefined", "NaN", "Infinity", "initJsPsych",
            "jsPsychHtmlKeyboardResponse", "bean", "__bean_k", "__bean_keys",
        ] {
            assert!(!is_identifier(name), "{name} accepted");
        }
        assert!(is_identifier("k"));
        assert!(is_identifier("keys"));

        let experiment = Experiment::new(vec![]).with_shared("my score", 0);
        assert!(matches!(experiment.validate(), Err(Error::InvalidIdentifier(_))));

        let experiment = Experiment::new(vec![]).with_shared("a", 0).with_shared("a", 1);
        assert!(matches!(experiment.validate(), Err(Error::DuplicateSharedVariable(_))));
    }

    #[test]
    fn blocks_are_found_by_name_or_position() {
        let mut experiment = Experiment::new(vec![scoring_block(), scoring_block().named("test")])
            .with_shared("score", 0);

        assert_eq!(experiment.block_mut("test").unwrap().name.as_deref(), Some("test"));
        assert_eq!(experiment.block_mut("0").unwrap().name, None);
        assert!(matches!(experiment.block_mut("2"), Err(Error::UnknownBlock(_))));
        assert!(matches!(experiment.block_mut("training"), Err(Error::UnknownBlock(_))));
    }

    #[test]
    fn trial_count_spans_records_and_repetitions() {
        let block = scoring_block().repeated(3);
        let experiment = Experiment::new(vec![block]).with_shared("score", 0);

        assert_eq!(experiment.trial_count(), 3);
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = std::env::temp_dir().join(format!("cogex-core-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("experiment.json");
        let experiment = Experiment::new(vec![scoring_block()]).with_shared("score", 0);

        experiment.save(&path).unwrap();
        assert_eq!(Experiment::load(&path).unwrap(), experiment);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
