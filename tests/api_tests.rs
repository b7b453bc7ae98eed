use agrimarket_gate::{
    AppConfig, AppState, Session, SessionVerifier, create_router,
    auth::{Claims, Role},
    config::Env,
    error::VerifyError,
    models::{LocaleInfo, PageContext, SessionInfo},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, Response, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::de::DeserializeOwned;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "api-test-secret";
const TEST_USER_ID: Uuid = Uuid::from_u128(42);

fn app() -> Router {
    let config = AppConfig {
        env: Env::Production,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    create_router(AppState::new(config).unwrap())
}

fn token(role: &str, admin: bool) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        sub: TEST_USER_ID,
        role: role.to_string(),
        iat: now,
        exp: now + 3600,
        admin,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn get(uri: &str, headers: &[(header::HeaderName, String)]) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    app()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn cookie(token: &str) -> (header::HeaderName, String) {
    (
        header::COOKIE,
        format!("{}={}", agrimarket_gate::config::DEFAULT_SESSION_COOKIE, token),
    )
}

// --- Tests ---

#[tokio::test]
async fn test_health_check_is_exempt() {
    let response = get("/api/health", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_root_redirects_to_negotiated_locale() {
    let response = get("/", &[]).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/en/");

    let response = get(
        "/marketplace?crop=maize",
        &[(header::ACCEPT_LANGUAGE, "sw-KE,sw;q=0.9".to_string())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/sw/marketplace?crop=maize");
}

#[tokio::test]
async fn test_public_page_renders_without_session() {
    let response = get("/fr/marketplace", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page: PageContext = json(response).await;
    assert_eq!(page.path, "/fr/marketplace");
    assert_eq!(page.locale.as_deref(), Some("fr"));
    assert_eq!(page.subject, None);
}

#[tokio::test]
async fn test_protected_page_redirects_anonymous_to_login() {
    let response = get("/en/dashboard/seller/orders?status=pending", &[]).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/en/login?from=%2Fen%2Fdashboard%2Fseller%2Forders%3Fstatus%3Dpending"
    );
}

#[tokio::test]
async fn test_protected_page_renders_with_session() {
    let response = get(
        "/en/dashboard/seller/orders",
        &[cookie(&token("SELLER", false))],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let page: PageContext = json(response).await;
    assert_eq!(page.subject, Some(TEST_USER_ID));
    assert_eq!(page.role, Some(Role::Seller));
}

#[tokio::test]
async fn test_wrong_role_is_sent_to_dashboard() {
    let response = get(
        "/en/dashboard/seller/orders",
        &[(header::AUTHORIZATION, format!("Bearer {}", token("BUYER", false)))],
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/en/dashboard");
}

#[tokio::test]
async fn test_signed_in_user_is_repelled_from_login() {
    let response = get("/en/login", &[cookie(&token("BUYER", false))]).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/en/dashboard");
}

#[tokio::test]
async fn test_admin_area_uses_admin_login() {
    let response = get("/en/admin/moderation", &[cookie(&token("ADMIN", false))]).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/en/admin/login?from=%2Fen%2Fadmin%2Fmoderation"
    );

    let response = get("/en/admin/moderation", &[cookie(&token("ADMIN", true))]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_static_asset_skips_gate() {
    let response = get("/images/hero.png", &[]).await;
    // Reaches the page fallback untouched: no redirect of any kind.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_endpoint_requires_session() {
    let response = get("/api/session", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(
        "/api/session",
        &[(header::AUTHORIZATION, format!("Bearer {}", token("MODERATOR", true)))],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let session: SessionInfo = json(response).await;
    assert_eq!(session.subject, TEST_USER_ID);
    assert_eq!(session.role, Some(Role::Moderator));
    assert!(session.admin);
}

/// An identity provider that never answers in time.
struct StalledVerifier;

#[async_trait]
impl SessionVerifier for StalledVerifier {
    async fn verify(&self, _headers: &HeaderMap) -> Result<Option<Session>, VerifyError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Some(Session {
            subject: TEST_USER_ID,
            role: Some(Role::Buyer),
            admin: false,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }))
    }
}

#[tokio::test]
async fn test_session_endpoint_times_out_stalled_verifier() {
    let config = AppConfig {
        env: Env::Production,
        verify_timeout: Duration::from_millis(50),
        ..AppConfig::default()
    };
    let mut state = AppState::new(config).unwrap();
    state.sessions = Arc::new(StalledVerifier);

    let request = Request::builder()
        .uri("/api/session")
        .body(Body::empty())
        .unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        create_router(state).oneshot(request),
    )
    .await
    .expect("session endpoint should not wait on a stalled verifier")
    .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_locales_endpoint_negotiates() {
    let response = get(
        "/api/locales",
        &[(header::ACCEPT_LANGUAGE, "de;q=0.9, fr;q=0.8".to_string())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let locales: LocaleInfo = json(response).await;
    assert_eq!(locales.supported, vec!["en", "fr", "sw"]);
    assert_eq!(locales.default, "en");
    assert_eq!(locales.negotiated, "fr");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = get("/api-docs/openapi.json", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_redirects_over_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app()).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .get(format!("{address}/en/cart?item=7"))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/en/login?from=%2Fen%2Fcart%3Fitem%3D7"
    );
    assert!(response.headers().contains_key("x-request-id"));
}
