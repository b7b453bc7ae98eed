use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public API routes. They live under the exempt `/api` namespace, so the gate neither
/// redirects nor authenticates them.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        // Liveness probe for load balancers.
        .route("/api/health", get(|| async { "ok" }))
        // GET /api/locales
        // Supported locales and the one negotiated for this caller.
        .route("/api/locales", get(handlers::get_locales))
}
