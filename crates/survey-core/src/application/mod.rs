//! Application layer
//!
//! Orchestrates use cases: every mutation runs inside one store transaction
//! and the events it recorded are dispatched once it has committed.

pub mod commands;
pub mod dispatcher;
pub mod dto;

pub use commands::{SubmissionService, SurveyService};
pub use dispatcher::EventDispatcher;
pub use dto::*;
