use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Invalid(#[from] cogex_core::Error),

    #[error("unsupported save format for `{0}`: only .json or .csv")]
    UnsupportedSaveFormat(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
