use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timeline::{TimelineTable, TimelineVariableRecord};
use crate::trial::TrialSpec;

/// A run of trials repeated once per timeline variable record (for example
/// an instruction, training, or test block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub trials: Vec<TrialSpec>,
    #[serde(default, skip_serializing_if = "TimelineTable::is_empty")]
    pub timeline: TimelineTable,
    #[serde(default)]
    pub randomize_order: bool,
    #[serde(default = "single")]
    pub repetitions: usize,
}

fn single() -> usize {
    1
}

impl Block {
    pub fn new(trials: Vec<TrialSpec>, timeline: TimelineTable) -> Self {
        Self {
            name: None,
            trials,
            timeline,
            randomize_order: false,
            repetitions: 1,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn randomized(mut self) -> Self {
        self.randomize_order = true;
        self
    }

    pub fn repeated(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Records the block iterates over; a block without a table runs once
    /// with an empty record.
    pub fn records(&self) -> Vec<&TimelineVariableRecord> {
        if self.timeline.is_empty() {
            vec![empty_record()]
        } else {
            self.timeline.iter().collect()
        }
    }

    /// Checks that every timeline variable a trial refers to is present in
    /// every record.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.trials.is_empty() {
            return Err(Error::EmptyBlock(index));
        }
        if let Some(key) = self.trials.iter().find_map(TrialSpec::current_data_read) {
            return Err(Error::CurrentTrialData { block: index, key });
        }
        let names: Vec<String> = self
            .trials
            .iter()
            .flat_map(TrialSpec::timeline_names)
            .collect();
        for (record_index, record) in self.records().into_iter().enumerate() {
            if let Some(name) = names.iter().find(|n| !record.contains(n)) {
                return Err(Error::MissingTimelineVariable {
                    block: index,
                    record: record_index,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn empty_record() -> &'static TimelineVariableRecord {
    static EMPTY: std::sync::OnceLock<TimelineVariableRecord> = std::sync::OnceLock::new();
    EMPTY.get_or_init(TimelineVariableRecord::new)
}
