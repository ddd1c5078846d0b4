//! Domain Services
//!
//! Stateless operations that span several aggregates. Each write operation
//! takes the transaction's tables and outbox explicitly.

pub mod access;
pub mod answer_engine;
pub mod cascade;
pub mod charts;
pub mod compiler;
pub mod versioning;

pub use answer_engine::{SubmitReport, WriteMode};
pub use charts::{ChartData, OptionCount};
pub use compiler::{QuestionCompiler, QuestionTree, DEFAULT_MAX_DEPTH};
pub use versioning::{JobOutcome, SettingsUpdate};
