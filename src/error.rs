use thiserror::Error;

/// ConfigError
///
/// Raised while compiling the gate configuration at startup. None of these can occur
/// once the gate is built: route tables and locales are validated exactly once and are
/// immutable afterwards.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pattern in {table} table: {source}")]
    InvalidPattern {
        table: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("At least one supported locale is required")]
    NoLocales,

    #[error("Malformed locale tag: {0:?}")]
    MalformedLocale(String),

    #[error("Default locale {0:?} is not in the supported list")]
    UnknownDefaultLocale(String),

    #[error("Redirect target {0:?} must start with '/'")]
    RelativeTarget(String),

    #[error("Login page {0:?} must match the public table")]
    LoginNotPublic(String),

    #[error("Failed to read gate configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse gate configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// VerifyError
///
/// Failures reported by a session verifier. The gate never surfaces these to the caller;
/// they are logged and degrade to "no valid session".
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Session verifier unavailable: {0}")]
    Unavailable(String),
}
