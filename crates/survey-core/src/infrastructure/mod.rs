//! Infrastructure layer
//!
//! Concrete adapters for the outbound ports and the relational store.

pub mod live;
pub mod persistence;
pub mod scheduler;

pub use live::{BroadcastLiveChannel, LiveSubscription};
pub use persistence::InMemoryStore;
pub use scheduler::TokioScheduler;
