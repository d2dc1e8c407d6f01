pub mod block;
pub mod error;
pub mod experiment;
pub mod expr;
pub mod stimulus;
pub mod timeline;
pub mod trial;

pub use block::Block;
pub use error::{Error, Result};
pub use experiment::{Experiment, SharedVariable};
pub use expr::{Case, EvalContext, Expr, SharedState};
pub use stimulus::StimulusTemplate;
pub use timeline::{TimelineTable, TimelineVariableRecord};
pub use trial::{SideEffect, TrialKind, TrialResult, TrialSpec};
