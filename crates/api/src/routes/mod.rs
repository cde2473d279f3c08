//! API routes.

pub mod health;
pub mod reports;
pub mod track;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/analytics/track-event", post(track::track_event_handler))
        .route(
            "/analytics/track-user-engagement",
            post(track::track_engagement_handler),
        )
        .route(
            "/analytics/track-content-performance",
            post(track::track_content_handler),
        )
        .route(
            "/analytics/track-keyword-ranking",
            post(track::track_keyword_handler),
        )
        .route("/reports/engagement", get(reports::engagement_report_handler))
        .route("/reports/content", get(reports::content_report_handler))
        .route(
            "/reports/funnel/:funnel_id",
            get(reports::funnel_report_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
