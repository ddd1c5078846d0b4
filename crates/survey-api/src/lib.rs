//! Survey Platform API
//!
//! REST and WebSocket surface over `survey-core`.
//!
//! ```text
//! /health                                   liveness
//! /live/surveys/{uuid}                      live chart feed (WebSocket)
//! /api/v1/auth/...                          OTP login, token refresh, logout
//! /api/v1/users/{id}                        admin account edits
//! /api/v1/surveys/...                       surveys, links, charts
//! /api/v1/surveys/{uuid}/forms/...          form versions and settings
//! /api/v1/surveys/{uuid}/submissions/...    answer sets
//! /api/v1/audiences                         target audiences
//! /api/v1/links/{token}                     one-time link redemption
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, patch};
use axum::Router;
use chrono::Utc;
use survey_core::{
    AuthService, BroadcastLiveChannel, EventDispatcher, InMemoryStore, PhoneNumber, QuestionCompiler, Role, ScheduledJob,
    SubmissionService, SubmissionUseCases, SurveyResult, SurveyService, SurveyUseCases, TokioScheduler, User,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::auth::{JwtAuthService, OtpSender};
use crate::config::ServerConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub surveys: Arc<dyn SurveyUseCases>,
    pub submissions: Arc<dyn SubmissionUseCases>,
    pub auth: Arc<dyn AuthService>,
    pub live: Arc<BroadcastLiveChannel>,
}

impl AppState {
    /// Wire services over `store`. Returns the queue fed by the timer
    /// scheduler; hand it to [`spawn_job_worker`].
    pub fn build(
        config: &ServerConfig,
        store: Arc<InMemoryStore>,
        otp_sender: Arc<dyn OtpSender>,
    ) -> (Self, mpsc::Receiver<ScheduledJob>) {
        let (scheduler, jobs) = TokioScheduler::new();
        let live = Arc::new(BroadcastLiveChannel::new(config.live_channel_capacity));
        let dispatcher = EventDispatcher::new(store.clone(), Arc::new(scheduler), live.clone());
        let compiler = QuestionCompiler::new(config.max_question_depth);

        let state = Self {
            surveys: Arc::new(SurveyService::new(store.clone(), compiler, dispatcher.clone())),
            submissions: Arc::new(SubmissionService::new(store.clone(), dispatcher)),
            auth: Arc::new(JwtAuthService::new(store, otp_sender, config)),
            live,
        };
        (state, jobs)
    }
}

/// Run due activation/deactivation jobs until the queue closes.
pub fn spawn_job_worker(
    surveys: Arc<dyn SurveyUseCases>,
    mut jobs: mpsc::Receiver<ScheduledJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let settings_id = job.settings_id;
            let action = job.action;
            match surveys.run_scheduled_job(job).await {
                Ok(outcome) => debug!(settings_id, ?action, ?outcome, "Scheduled job ran"),
                Err(error) => warn!(%error, settings_id, ?action, "Scheduled job failed"),
            }
        }
    })
}

/// Ensure every listed phone number has a superuser account.
pub fn bootstrap_admins(store: &InMemoryStore, phones: &[PhoneNumber]) -> SurveyResult<()> {
    store.transaction(|tx, _| {
        for phone in phones {
            let id = match tx.user_by_phone(phone) {
                Some(user) => user.id,
                None => tx.insert_user(User::new(phone.clone(), Role::Management, Utc::now()))?,
            };
            if let Some(user) = tx.user_mut(id) {
                user.is_staff = true;
                user.is_superuser = true;
                user.is_active = true;
            }
        }
        Ok(())
    })?;

    if !phones.is_empty() {
        info!(count = phones.len(), "Admin accounts bootstrapped");
    }
    Ok(())
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/live/surveys/:survey_uuid", get(ws::live_feed))
        .nest("/api/v1", api_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", routes::auth::router())
        .route("/users/:user_id", patch(routes::auth::update_account))
        .nest("/surveys", routes::surveys::router())
        .nest("/surveys/:survey_uuid/forms", routes::forms::router())
        .nest("/surveys/:survey_uuid/submissions", routes::submissions::router())
        .nest("/audiences", routes::audiences::router())
        .nest("/links", routes::links::router())
}
