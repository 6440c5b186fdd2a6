use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/surveys", get(handlers::list_surveys).post(handlers::create_survey))
        .route("/api/surveys/stats", get(handlers::survey_stats))
        .route("/api/surveys/analyze", post(handlers::analyze_surveys))
        .route("/api/stories", get(handlers::list_stories).post(handlers::create_story))
        .route("/api/stories/:id", get(handlers::get_story))
        .route("/api/stories/:id/publish", post(handlers::publish_story))
        .route("/api/stories/:id/like", post(handlers::like_story))
        .route("/api/students/:id/stories", get(handlers::student_stories))
        .route("/api/alerts", get(handlers::list_alerts))
        .route("/api/alerts/:id/resolve", post(handlers::resolve_alert))
        .route(
            "/api/counselor-requests",
            get(handlers::list_counselor_requests).post(handlers::create_counselor_request),
        )
        .route("/api/counselor-requests/:id/assign", post(handlers::assign_counselor))
        .route("/api/counselor-requests/:id/status", post(handlers::update_request_status))
        .route("/api/analytics", get(handlers::analytics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
