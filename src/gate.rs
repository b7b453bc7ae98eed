use std::time::Duration;

use axum::http::{HeaderMap, Uri, header};
use chrono::Utc;

use crate::{
    auth::{Session, SessionVerifier},
    config::GateConfig,
    error::ConfigError,
    locale::Locales,
    rules::{RouteClass, RouteTables, classify},
};

/// Decision
///
/// What the gate wants done with a request. Framework-agnostic: the HTTP middleware
/// translates it into either the next service or a redirect response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    PassThrough,
    Redirect(String),
}

/// GateOutcome
///
/// The decision plus the session verified along the way, if any. On pass-through the
/// session is handed to downstream handlers.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub decision: Decision,
    pub session: Option<Session>,
}

impl GateOutcome {
    fn pass(session: Option<Session>) -> Self {
        Self {
            decision: Decision::PassThrough,
            session,
        }
    }

    fn redirect(target: String) -> Self {
        Self {
            decision: Decision::Redirect(target),
            session: None,
        }
    }
}

/// GateRequest
///
/// The only parts of an inbound request the gate reads.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

impl<'a> GateRequest<'a> {
    pub fn new(uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            path: uri.path(),
            query: uri.query(),
            headers,
        }
    }

    /// Path and query exactly as requested, used for the `from` return destination.
    fn original(&self) -> String {
        match self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.to_string(),
        }
    }
}

/// Gate
///
/// The route authorization gate: validated locales, compiled route tables and redirect
/// targets. Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct Gate {
    locales: Locales,
    tables: RouteTables,
    login_path: String,
    admin_login_path: String,
    dashboard_path: String,
    verify_timeout: Duration,
}

impl Gate {
    pub fn new(config: &GateConfig, verify_timeout: Duration) -> Result<Self, ConfigError> {
        let locales = Locales::new(&config.locales)?;
        let tables = RouteTables::compile(config)?;

        for target in [
            &config.login_path,
            &config.admin_login_path,
            &config.dashboard_path,
        ] {
            if !target.starts_with('/') {
                return Err(ConfigError::RelativeTarget(target.clone()));
            }
        }

        // A login page that needs a session would redirect to itself forever.
        for login in [&config.login_path, &config.admin_login_path] {
            let qualified = format!("/{}{}", locales.default_locale(), login);
            if classify(&qualified, &tables) != RouteClass::Public {
                return Err(ConfigError::LoginNotPublic(qualified));
            }
        }

        Ok(Self {
            locales,
            tables,
            login_path: config.login_path.clone(),
            admin_login_path: config.admin_login_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
            verify_timeout,
        })
    }

    pub fn locales(&self) -> &Locales {
        &self.locales
    }

    /// decide
    ///
    /// Evaluates a request in a fixed order, stopping at the first step that resolves:
    ///
    /// 1. asset or exempt paths pass untouched;
    /// 2. paths without a supported locale prefix redirect to the negotiated locale;
    /// 3. login/register pages pass, unless the caller is signed in (sent to the dashboard);
    /// 4. public pages pass;
    /// 5. the admin area requires the elevated-privilege flag (else admin login);
    /// 6. everything else requires a session (else login, with `from`);
    /// 7. the caller's role must be entitled to every role pattern matching the path
    ///    (else dashboard).
    ///
    /// The session is verified lazily: steps 1, 2 and 4 never touch the token.
    pub async fn decide(
        &self,
        request: &GateRequest<'_>,
        verifier: &dyn SessionVerifier,
    ) -> GateOutcome {
        let path = request.path;

        let class = match classify(path, &self.tables) {
            RouteClass::Asset | RouteClass::Exempt => return GateOutcome::pass(None),
            class => class,
        };

        let Some(locale) = self.locales.locale_of(path) else {
            let accept_language = request
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|value| value.to_str().ok());
            let locale = self.locales.negotiate(accept_language);
            let target = format!("/{}{}", locale, request.original());
            tracing::debug!(path, %target, "locale redirect");
            return GateOutcome::redirect(target);
        };

        if self.tables.auth_pages.is_match(path) {
            return match self.verify_session(request.headers, verifier).await {
                Some(_) => {
                    let target = self.localized(locale, &self.dashboard_path);
                    tracing::debug!(path, %target, "signed-in caller on auth page");
                    GateOutcome::redirect(target)
                }
                None => GateOutcome::pass(None),
            };
        }

        let entitled = match class {
            RouteClass::Protected { entitled } => entitled,
            _ => return GateOutcome::pass(None),
        };

        let session = self.verify_session(request.headers, verifier).await;

        if self.tables.admin_area.is_match(path) {
            return match session {
                Some(session) if session.admin => GateOutcome::pass(Some(session)),
                _ => {
                    let target = self.with_return_path(
                        self.localized(locale, &self.admin_login_path),
                        request,
                    );
                    tracing::debug!(path, %target, "admin area without elevated session");
                    GateOutcome::redirect(target)
                }
            };
        }

        let Some(session) = session else {
            let target = self.with_return_path(self.localized(locale, &self.login_path), request);
            tracing::debug!(path, %target, "no valid session");
            return GateOutcome::redirect(target);
        };

        if self.is_dashboard(locale, path) {
            return GateOutcome::pass(Some(session));
        }

        match session.role {
            Some(role) if entitled.contains(&role) => GateOutcome::pass(Some(session)),
            role => {
                let target = self.localized(locale, &self.dashboard_path);
                tracing::info!(
                    path,
                    subject = %session.subject,
                    ?role,
                    ?entitled,
                    "role not entitled, redirecting to dashboard"
                );
                GateOutcome::redirect(target)
            }
        }
    }

    /// Verifies the session under the configured timeout. Verifier errors, timeouts and
    /// sessions already past their expiry all count as "no valid session".
    pub async fn verify_session(
        &self,
        headers: &HeaderMap,
        verifier: &dyn SessionVerifier,
    ) -> Option<Session> {
        let session = match tokio::time::timeout(self.verify_timeout, verifier.verify(headers)).await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session verification failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.verify_timeout, "session verification timed out");
                None
            }
        };

        session.filter(|s| s.expires_at > Utc::now())
    }

    fn localized(&self, locale: &str, target: &str) -> String {
        format!("/{locale}{target}")
    }

    /// The default dashboard is where denied callers land, so any valid session may open
    /// it regardless of the role table.
    fn is_dashboard(&self, locale: &str, path: &str) -> bool {
        let dashboard = self.localized(locale, &self.dashboard_path);
        path.trim_end_matches('/') == dashboard.trim_end_matches('/')
    }

    fn with_return_path(&self, target: String, request: &GateRequest<'_>) -> String {
        match serde_urlencoded::to_string([("from", request.original())]) {
            Ok(query) => format!("{target}?{query}"),
            Err(e) => {
                tracing::warn!(error = %e, "could not encode return path");
                target
            }
        }
    }
}
