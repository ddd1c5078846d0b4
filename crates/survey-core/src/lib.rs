//! Survey Platform Core
//!
//! Versioned survey forms following Domain-Driven Design (DDD) with a
//! hexagonal split between use cases and adapters.
//!
//! ## Architecture
//!
//! - **Domain Layer**: aggregates, the TypedValue unions, domain events and
//!   the services that run inside one store transaction
//! - **Application Layer**: use case orchestration and post-commit dispatch
//! - **Ports Layer**: use case traits and the scheduler, live channel and auth
//!   collaborators
//! - **Infrastructure Layer**: in-memory relational store, tokio timer
//!   scheduler, broadcast live channel
//!
//! ## Key Operations
//!
//! - Compile a form definition into a question tree with typed options
//! - Store submitted answers as typed values, resolved by question name
//! - Keep at most one active form version per survey
//! - Soft delete and restore whole subtrees with one shared timestamp
//! - Aggregate option counts for charts and the live feed

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use application::{EventDispatcher, SubmissionService, SurveyService};
pub use domain::aggregates::{
    Answer, AnswerSet, FormSettings, OneTimeLink, Question, QuestionOption, Survey, SurveyForm,
    TargetAudience, User,
};
pub use domain::events::{DomainEvent, FormEvent, SubmissionEvent, SurveyEvent};
pub use domain::services::{ChartData, QuestionCompiler};
pub use domain::value_objects::{AnswerValue, OptionValue, PhoneNumber, QuestionType, Role, RowId};
pub use error::{ErrorKind, FieldErrors, SurveyError, SurveyResult};
pub use infrastructure::{BroadcastLiveChannel, InMemoryStore, LiveSubscription, TokioScheduler};
pub use ports::inbound::{SubmissionUseCases, SurveyUseCases};
pub use ports::outbound::{AccountUpdate, AuthService, JobAction, JobScheduler, LiveUpdateChannel, ScheduledJob};
