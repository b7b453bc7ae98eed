use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated API routes.
///
/// `/api` is exempt from the gate, so these are wrapped in the session-requiring
/// middleware by `create_router` instead; a request without a valid session is rejected
/// with 401 before reaching a handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/session
        // The caller's verified session (subject, role, admin flag, expiry).
        .route("/api/session", get(handlers::get_session))
}
