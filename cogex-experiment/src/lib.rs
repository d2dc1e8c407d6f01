pub mod config;
pub mod data;
pub mod demo;
pub mod error;
pub mod feedback;
pub mod presentation;
pub mod responder;
pub mod scoring;
pub mod state;
pub use config::{ExperimentConfig, ParticipantConfig};
pub use data::{ResultLog, Summary};
pub use error::{Result, RunError};
pub use feedback::{FeedbackScreen, FeedbackStyle, FeedbackVariant};
pub use presentation::{Capture, Presentation};
pub use responder::{
    PromptResponder, ReplayResponder, Responder, ScriptedResponder, SimulatedParticipant,
};
pub use state::ExperimentRunner;
