//! API Routes

pub mod audiences;
pub mod auth;
pub mod forms;
pub mod health;
pub mod links;
pub mod submissions;
pub mod surveys;
