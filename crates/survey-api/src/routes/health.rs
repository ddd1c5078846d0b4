//! Liveness check in the response envelope.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Reply;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub server_time: DateTime<Utc>,
    /// Surveys with at least one open live feed.
    pub live_topics: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Reply<HealthStatus> {
    Reply::ok(
        "healthy",
        HealthStatus {
            version: env!("CARGO_PKG_VERSION"),
            server_time: Utc::now(),
            live_topics: state.live.topic_count(),
        },
    )
}
