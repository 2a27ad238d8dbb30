use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::handlers;
use crate::api::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Sessions
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/saved-reports/:hash/resume", post(handlers::resume_session))
        // Target selection cascade
        .route(
            "/sessions/:id/accounts/refresh",
            post(handlers::refresh_accounts),
        )
        .route(
            "/sessions/:id/stages/:stage/select",
            post(handlers::select_stage),
        )
        .route(
            "/sessions/:id/stages/:stage/refresh",
            post(handlers::refresh_stage),
        )
        .route("/sessions/:id/target-kind", put(handlers::set_target_kind))
        .route("/sessions/:id/validation", get(handlers::validate_targets))
        .route("/sessions/:id/commit", post(handlers::commit_targets))
        // Assessment report
        .route(
            "/sessions/:id/assessment",
            get(handlers::get_assessment),
        )
        .route(
            "/sessions/:id/assessment/import",
            post(handlers::import_assessment),
        )
        .route(
            "/sessions/:id/assessment/save",
            post(handlers::save_assessment),
        )
        .route("/sessions/:id/databases", put(handlers::set_databases))
}
