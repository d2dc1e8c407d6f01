use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("timeline variable `{0}` is not defined for the current record")]
    UnknownTimelineVariable(String),

    #[error("block {block}, record {record}: missing timeline variable `{name}`")]
    MissingTimelineVariable {
        block: usize,
        record: usize,
        name: String,
    },

    #[error("data lookback of {window} trial(s) but only {available} recorded")]
    DataWindow { window: usize, available: usize },

    #[error("shared variable `{0}` is not declared")]
    UnknownSharedVariable(String),

    #[error("`{0}` is not a valid variable name")]
    InvalidIdentifier(String),

    #[error("shared variable `{0}` is declared twice")]
    DuplicateSharedVariable(String),

    #[error("parameter `{name}` has invalid value {value}")]
    InvalidParameter { name: String, value: Value },

    #[error("block {0} has no trials")]
    EmptyBlock(usize),

    #[error("block {block}: `{key}` reads the current trial's data outside a side effect")]
    CurrentTrialData { block: usize, key: String },

    #[error("no block named or numbered `{0}`")]
    UnknownBlock(String),

    #[error("column `{0}` not found in timeline table")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
