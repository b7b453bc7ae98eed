use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod locale;
pub mod models;
pub mod rules;

// API routes by access tier (public, authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{JwtSessionVerifier, Session, SessionState, SessionVerifier};
pub use config::{AppConfig, GateConfig};
pub use error::ConfigError;
pub use gate::{Decision, Gate, GateOutcome, GateRequest};

/// ApiDoc
///
/// OpenAPI document for the service's own API endpoints, served at
/// `/api-docs/openapi.json`. Page routes are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_locales, handlers::get_session),
    components(schemas(models::LocaleInfo, models::SessionInfo, models::PageContext, auth::Role)),
    tags((name = "agrimarket-gate", description = "Marketplace route authorization gate"))
)]
struct ApiDoc;

/// Shared handle to the compiled gate.
pub type GateState = Arc<Gate>;

/// AppState
///
/// The single, immutable container shared across all requests: configuration, the
/// compiled gate, and the session verifier.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gate: GateState,
    pub sessions: SessionState,
}

impl AppState {
    /// Builds the gate from `config.gate` and a JWT verifier from the session settings.
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        let gate = Gate::new(&config.gate, config.verify_timeout)?;
        let sessions = Arc::new(JwtSessionVerifier::from_config(&config)) as SessionState;

        Ok(Self {
            gate: Arc::new(gate),
            sessions,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// gate_middleware
///
/// Runs the route authorization gate in front of every route, the page fallback
/// included. A redirect decision short-circuits with `307 Temporary Redirect`; on
/// pass-through the verified session, if any, rides along in the request extensions.
async fn gate_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let outcome = {
        let gate_request = GateRequest::new(request.uri(), request.headers());
        state.gate.decide(&gate_request, state.sessions.as_ref()).await
    };

    match outcome.decision {
        Decision::PassThrough => {
            if let Some(session) = outcome.session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        Decision::Redirect(target) => Redirect::temporary(&target).into_response(),
    }
}

/// require_session
///
/// Guards the authenticated API tier. Extracting `Session` rejects with 401 when no
/// valid session is present, so the handler never runs.
async fn require_session(_session: Session, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, the gate, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_session,
            )),
        )
        // Every page path lands here once the gate lets it through.
        .fallback(handlers::render_page)
        // Outermost application layer: the gate sees every request before any route.
        .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the request id, so every log line the gate
/// emits for a request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
