use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    GateState,
    config::{AppConfig, Env},
    error::VerifyError,
};

/// Role
///
/// The role claim carried by a marketplace session. Route entitlements in the
/// role-protected table are keyed by these values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Buyer,
    Seller,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Buyer, Role::Seller, Role::Moderator, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "BUYER",
            Role::Seller => "SELLER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    /// Role claims are matched case-insensitively; the identity provider has
    /// historically emitted both `seller` and `SELLER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Claims
///
/// Payload of the session JWT minted by the identity provider at login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    /// Role claim as issued. Unknown values are kept as a session without entitlements.
    pub role: String,
    /// Expiration Time (exp), validated on every decode.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Elevated-privilege flag for the admin dashboard family.
    #[serde(default)]
    pub admin: bool,
}

/// Session
///
/// The verified, read-only view of a caller's session. The gate attaches it to the
/// request on pass-through so downstream handlers do not decode the token twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub subject: Uuid,
    /// `None` when the role claim is not one the marketplace knows; such a session
    /// is authenticated but entitled to nothing.
    pub role: Option<Role>,
    pub admin: bool,
    pub expires_at: DateTime<Utc>,
}

/// SessionVerifier
///
/// The identity provider seam: given the request headers, return the verified session
/// or `None`. Implementations that perform I/O are bounded by the gate's verify timeout.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> Result<Option<Session>, VerifyError>;
}

/// Shared, type-erased verifier held in the application state.
pub type SessionState = Arc<dyn SessionVerifier>;

/// JwtSessionVerifier
///
/// Verifies HS256 session tokens signed with the shared identity-provider secret.
/// The token is read from the session cookie first, then from an
/// `Authorization: Bearer` header.
#[derive(Clone)]
pub struct JwtSessionVerifier {
    env: Env,
    cookie_name: String,
    decoding_key: DecodingKey,
}

impl JwtSessionVerifier {
    pub fn new(env: Env, secret: &str, cookie_name: impl Into<String>) -> Self {
        Self {
            env,
            cookie_name: cookie_name.into(),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.env.clone(), &config.jwt_secret, &config.session_cookie)
    }

    /// Local development bypass: `x-user-id` (and optionally `x-user-role`) stand in for
    /// a signed token. Never consulted outside `Env::Local`.
    ///
    /// The elevated-privilege flag is never implied by the role; it is only set by an
    /// explicit `x-user-admin: true`.
    fn local_bypass(&self, headers: &HeaderMap) -> Option<Session> {
        if self.env != Env::Local {
            return None;
        }

        let subject = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|id| Uuid::parse_str(id).ok())?;

        let role = headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
            .and_then(|role| role.parse::<Role>().ok());

        let admin = headers
            .get("x-user-admin")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

        tracing::debug!(%subject, ?role, admin, "local bypass session");

        Some(Session {
            subject,
            role,
            admin,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    /// Candidate tokens in precedence order: the session cookie, then the Bearer header.
    fn candidate_tokens<'a>(&'a self, headers: &'a HeaderMap) -> impl Iterator<Item = &'a str> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, token)| token);

        let from_bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        from_cookie.into_iter().chain(from_bearer)
    }

    /// Decodes a raw token. Every decode failure (expired, bad signature, garbage)
    /// yields `None`: a broken token is the same as no token.
    pub fn decode_token(&self, token: &str) -> Option<Session> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                    kind => tracing::debug!(?kind, "session token rejected"),
                }
                return None;
            }
        };

        let expires_at = DateTime::from_timestamp(claims.exp as i64, 0)?;
        let role = claims.role.parse::<Role>().ok();
        if role.is_none() {
            tracing::warn!(subject = %claims.sub, role = %claims.role, "unknown role claim");
        }

        Some(Session {
            subject: claims.sub,
            role,
            admin: claims.admin,
            expires_at,
        })
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Result<Option<Session>, VerifyError> {
        if let Some(session) = self.local_bypass(headers) {
            return Ok(Some(session));
        }

        // A stale cookie must not shadow a valid Bearer token.
        Ok(self
            .candidate_tokens(headers)
            .find_map(|token| self.decode_token(token)))
    }
}

/// Session Extractor Implementation
///
/// Makes `Session` usable as a handler argument. A session already attached by the gate
/// is reused; otherwise (API routes are exempt from the gate) the session is verified
/// through the gate, under the same timeout and expiry rules the gate applies.
///
/// Rejection: StatusCode::UNAUTHORIZED (401) when no valid session is present.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    GateState: FromRef<S>,
    SessionState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let gate = GateState::from_ref(state);
        let verifier = SessionState::from_ref(state);
        gate.verify_session(&parts.headers, verifier.as_ref())
            .await
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
