use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seeds block shuffling and the simulated participant.
    pub seed: Option<u64>,
    pub inter_trial_interval_ms: u64,
    pub participant: ParticipantConfig,
}

/// Behaviour of the simulated participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantConfig {
    pub accuracy: f64,
    pub miss_rate: f64,
    pub rt_range_ms: (u64, u64),
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: None,
            inter_trial_interval_ms: 0,
            participant: ParticipantConfig::default(),
        }
    }
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            accuracy: 0.9,
            miss_rate: 0.05,
            rt_range_ms: (300, 900),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.participant;
        if !(0.0..=1.0).contains(&p.accuracy) {
            return Err(RunError::Config(format!(
                "accuracy {} outside [0, 1]",
                p.accuracy
            )));
        }
        if !(0.0..=1.0).contains(&p.miss_rate) {
            return Err(RunError::Config(format!(
                "miss_rate {} outside [0, 1]",
                p.miss_rate
            )));
        }
        if p.rt_range_ms.0 > p.rt_range_ms.1 {
            return Err(RunError::Config(format!(
                "rt_range_ms {:?} is reversed",
                p.rt_range_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"seed": 7, "participant": {"accuracy": 0.5}}"#).unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.participant.accuracy, 0.5);
        assert_eq!(config.participant.rt_range_ms, (300, 900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = ExperimentConfig::default();
        config.participant.miss_rate = 1.5;
        assert!(matches!(config.validate(), Err(RunError::Config(_))));

        let mut config = ExperimentConfig::default();
        config.participant.rt_range_ms = (900, 300);
        assert!(config.validate().is_err());
    }
}
