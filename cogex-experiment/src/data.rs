//! Result log and post-run processing.

use std::fs;
use std::path::Path;

use cogex_core::trial::{ECHO_PREFIX, TrialKind};
use cogex_core::TrialResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Append-only sequence of trial results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultLog {
    records: Vec<TrialResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TrialResult) {
        self.records.push(result);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[TrialResult] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrialResult> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TrialResult> {
        self.records.last()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.records)
    }
}

impl<'a> IntoIterator for &'a ResultLog {
    type Item = &'a TrialResult;
    type IntoIter = std::slice::Iter<'a, TrialResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Keeps the runner's core fields and the namespaced parameters, with the
/// namespace stripped.
pub fn strip_namespace(records: &[TrialResult]) -> Result<Vec<Map<String, Value>>> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            continue;
        };
        let row = fields
            .into_iter()
            .filter_map(|(key, value)| {
                if let Some(name) = key.strip_prefix(ECHO_PREFIX) {
                    return Some((name.to_string(), value));
                }
                matches!(key.as_str(), "rt" | "stimulus" | "trial_type" | "response")
                    .then_some((key, value))
            })
            .collect();
        out.push(row);
    }
    Ok(out)
}

pub fn count_responses(records: &[TrialResult]) -> usize {
    records.iter().filter(|r| r.response.is_some()).count()
}

/// Records up to, not including, the (n+1)-th response. Useful to replay
/// the first part of a session and simulate the rest.
pub fn until_response(records: &[TrialResult], n: usize) -> &[TrialResult] {
    let mut seen = 0;
    for (index, record) in records.iter().enumerate() {
        if record.response.is_some() {
            seen += 1;
        }
        if seen > n {
            return &records[..index];
        }
    }
    records
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub trials: usize,
    pub response_trials: usize,
    pub responses: usize,
    pub correct: usize,
    pub mean_rt_ms: Option<f64>,
}

impl Summary {
    /// Counts over response-collection trials only.
    pub fn of(records: &[TrialResult]) -> Self {
        let kind = Value::from(TrialKind::ResponseCollection.as_str());
        let scored: Vec<&TrialResult> = records
            .iter()
            .filter(|r| r.echoed("kind") == Some(&kind))
            .collect();
        let rts: Vec<u64> = scored.iter().filter_map(|r| r.rt).collect();
        Self {
            trials: records.len(),
            response_trials: scored.len(),
            responses: scored.iter().filter(|r| r.responded()).count(),
            correct: scored.iter().filter(|r| r.correct).count(),
            mean_rt_ms: (!rts.is_empty())
                .then(|| rts.iter().sum::<u64>() as f64 / rts.len() as f64),
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        (self.response_trials > 0).then(|| self.correct as f64 / self.response_trials as f64)
    }
}
