use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, Uri, header},
};

use crate::{
    GateState,
    auth::Session,
    models::{LocaleInfo, PageContext, SessionInfo},
};

/// get_locales
///
/// [Public Route] Lists the supported locales and negotiates one for the caller's
/// `Accept-Language` header, exactly as the gate would for a locale redirect.
#[utoipa::path(
    get,
    path = "/api/locales",
    responses((status = 200, description = "Locale configuration", body = LocaleInfo))
)]
pub async fn get_locales(State(gate): State<GateState>, headers: HeaderMap) -> Json<LocaleInfo> {
    let locales = gate.locales();
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());

    Json(LocaleInfo {
        supported: locales.supported().to_vec(),
        default: locales.default_locale().to_string(),
        negotiated: locales.negotiate(accept_language).to_string(),
    })
}

/// get_session
///
/// [Authenticated Route] Returns the caller's verified session.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current session", body = SessionInfo),
        (status = 401, description = "No valid session")
    )
)]
pub async fn get_session(session: Session) -> Json<SessionInfo> {
    Json(session.into())
}

/// render_page
///
/// Fallback for every page route. Rendering lives outside this service; this hands the
/// renderer the context the gate resolved (locale and, for protected pages, the session).
pub async fn render_page(
    State(gate): State<GateState>,
    uri: Uri,
    session: Option<Extension<Session>>,
) -> Json<PageContext> {
    let path = uri.path();
    let session = session.map(|Extension(session)| session);

    Json(PageContext {
        path: path.to_string(),
        locale: gate.locales().locale_of(path).map(str::to_string),
        subject: session.as_ref().map(|s| s.subject),
        role: session.and_then(|s| s.role),
    })
}
