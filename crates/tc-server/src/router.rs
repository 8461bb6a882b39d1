//! Axum router construction.

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        // Bare /play is the live control socket; /play/<path>/<artifact>
        // is the VOD surface.
        .route("/play", get(routes::live::ws_play))
        .route("/play/{*tail}", get(routes::play::play))
        .route("/preview/{*tail}", get(routes::preview::preview))
        .route("/live/{session_id}/{file}", get(routes::live::live_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
