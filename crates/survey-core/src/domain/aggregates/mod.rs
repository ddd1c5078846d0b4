//! Aggregates module

pub mod audience;
pub mod form;
pub mod link;
pub mod question;
pub mod submission;
pub mod survey;
pub mod user;

pub use audience::TargetAudience;
pub use form::{FormSettings, SurveyForm};
pub use link::OneTimeLink;
pub use question::{Question, QuestionOption};
pub use submission::{Answer, AnswerSet};
pub use survey::Survey;
pub use user::User;
