//! Compiles experiments to jsPsych programs.

pub mod compile;
pub mod error;
pub mod js;
pub mod page;

pub use compile::{block_js, compile, trial_js};
pub use error::{CompileError, Result};
pub use page::{CompileOptions, OutputFormat, SaveTarget};
