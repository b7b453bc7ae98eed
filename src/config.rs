use std::{collections::BTreeMap, env, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{auth::Role, error::ConfigError};

/// AppConfig
///
/// Holds the service's entire configuration state. Immutable once loaded and pulled into
/// handlers through `FromRef`, like every other piece of the unified `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local session bypass and log format.
    pub env: Env,
    // Shared secret used to verify session JWTs minted by the identity provider.
    pub jwt_secret: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Name of the cookie carrying the session token.
    pub session_cookie: String,
    // Upper bound on a single session verification; a timeout counts as "no session".
    pub verify_timeout: Duration,
    // Locales and route tables, validated when the gate is built.
    pub gate: GateConfig,
}

/// Env
///
/// Runtime context: `Local` enables developer conveniences (header session bypass,
/// pretty logs), `Production` hardens them away.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_SESSION_COOKIE: &str = "agrimarket.session-token";
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 500;

impl Default for AppConfig {
    /// Non-panicking configuration for tests, using the built-in marketplace tables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            verify_timeout: Duration::from_millis(DEFAULT_VERIFY_TIMEOUT_MS),
            gate: GateConfig::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment at startup, failing fast.
    ///
    /// # Panics
    /// Panics when `SESSION_JWT_SECRET` is missing in production, when a numeric variable
    /// does not parse, or when `GATE_CONFIG_PATH` points at an unreadable or malformed file.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => env::var("SESSION_JWT_SECRET")
                .expect("FATAL: SESSION_JWT_SECRET must be set in production."),
            Env::Local => {
                env::var("SESSION_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
            }
        };

        let verify_timeout = env::var("VERIFY_TIMEOUT_MS")
            .map(|ms| {
                ms.parse::<u64>()
                    .expect("FATAL: VERIFY_TIMEOUT_MS must be a number of milliseconds")
            })
            .unwrap_or(DEFAULT_VERIFY_TIMEOUT_MS);

        let gate = match env::var("GATE_CONFIG_PATH") {
            Ok(path) => {
                tracing::info!("Loading gate configuration from {path}");
                GateConfig::from_file(&path)
                    .unwrap_or_else(|e| panic!("FATAL: invalid gate configuration {path}: {e}"))
            }
            Err(_) => GateConfig::default(),
        };

        Self {
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            session_cookie: env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            verify_timeout: Duration::from_millis(verify_timeout),
            gate,
            env,
        }
    }
}

/// LocaleConfig
///
/// Supported locale tags in preference order, plus the fallback used when content
/// negotiation finds no overlap.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocaleConfig {
    pub supported: Vec<String>,
    pub default: String,
}

/// GateConfig
///
/// The gate's route tables as plain data. Patterns are regular expressions matched
/// against the whole request path (they are anchored when compiled). Redirect targets
/// are locale-relative: the caller's locale prefix is prepended at redirect time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub locales: LocaleConfig,
    /// Static files; never redirected, never authenticated.
    pub asset: Vec<String>,
    /// API/RPC/webhook namespaces and fixed utility paths; never redirected, never authenticated.
    pub exempt: Vec<String>,
    /// Locale-qualified pages reachable without a session.
    pub public: Vec<String>,
    /// Login/register pages; an authenticated caller is sent to the dashboard instead.
    pub auth_pages: Vec<String>,
    /// Admin dashboard family, guarded by the elevated-privilege flag.
    pub admin_area: Vec<String>,
    /// Role-protected table. The same pattern may be listed under several roles.
    pub roles: BTreeMap<Role, Vec<String>>,
    pub login_path: String,
    pub admin_login_path: String,
    pub dashboard_path: String,
}

impl GateConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

fn role_patterns(shared: &[&str], own: &[&str]) -> Vec<String> {
    shared.iter().chain(own).map(|p| p.to_string()).collect()
}

impl Default for GateConfig {
    /// The marketplace's built-in tables.
    fn default() -> Self {
        // Areas every signed-in role shares. The dashboard root itself needs no entry.
        let shared = [
            r"/\w{2}/profile(/.*)?",
            r"/\w{2}/settings(/.*)?",
            r"/\w{2}/community(/.*)?",
            r"/\w{2}/groups(/.*)?",
            r"/\w{2}/chat(/.*)?",
            r"/\w{2}/assistant(/.*)?",
            r"/\w{2}/notifications(/.*)?",
        ];
        let seller_area = r"/\w{2}/dashboard/seller(/.*)?";
        let moderator_area = r"/\w{2}/dashboard/moderator(/.*)?";
        let listings = r"/\w{2}/listings(/.*)?";

        let mut roles = BTreeMap::new();
        roles.insert(
            Role::Buyer,
            role_patterns(
                &shared,
                &[
                    r"/\w{2}/dashboard/buyer(/.*)?",
                    r"/\w{2}/cart(/.*)?",
                    r"/\w{2}/checkout(/.*)?",
                    r"/\w{2}/orders(/.*)?",
                ],
            ),
        );
        roles.insert(
            Role::Seller,
            role_patterns(&shared, &[seller_area, listings]),
        );
        // Moderators and admins are listed on the seller area explicitly.
        roles.insert(
            Role::Moderator,
            role_patterns(&shared, &[moderator_area, seller_area, listings]),
        );
        roles.insert(
            Role::Admin,
            role_patterns(&shared, &[moderator_area, seller_area, listings]),
        );

        Self {
            locales: LocaleConfig {
                supported: patterns(&["en", "fr", "sw"]),
                default: "en".to_string(),
            },
            asset: patterns(&[
                r".*\.(?:png|jpe?g|gif|svg|ico|webp|avif|bmp|css|js|mjs|map|woff2?|ttf|otf|eot|mp4|webm|pdf|txt|xml|webmanifest)",
            ]),
            exempt: patterns(&[
                r"/api(/.*)?",
                r"/trpc(/.*)?",
                r"/webhooks?(/.*)?",
                r"/_next(/.*)?",
                r"/swagger-ui(/.*)?",
                r"/api-docs(/.*)?",
                r"/favicon\.ico",
                r"/robots\.txt",
                r"/sitemap\.xml",
            ]),
            public: patterns(&[
                r"/\w{2}/?",
                r"/\w{2}/(login|register)(/.*)?",
                r"/\w{2}/(forgot-password|reset-password|verify-email)(/.*)?",
                r"/\w{2}/admin/login",
                r"/\w{2}/(about|contact|faq|terms|privacy)",
                r"/\w{2}/marketplace(/.*)?",
                r"/\w{2}/products(/.*)?",
                r"/\w{2}/sellers/[^/]+",
            ]),
            auth_pages: patterns(&[r"/\w{2}/(login|register)(/.*)?"]),
            admin_area: patterns(&[r"/\w{2}/admin(/.*)?"]),
            roles,
            login_path: "/login".to_string(),
            admin_login_path: "/admin/login".to_string(),
            dashboard_path: "/dashboard".to_string(),
        }
    }
}
