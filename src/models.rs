use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Role, Session};

// --- API Response Schemas (Exported to the frontend via ts-rs) ---

/// SessionInfo
///
/// The caller's verified session as returned by `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SessionInfo {
    pub subject: Uuid,
    // `None` when the identity provider issued a role the marketplace does not know.
    pub role: Option<Role>,
    pub admin: bool,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            subject: session.subject,
            role: session.role,
            admin: session.admin,
            expires_at: session.expires_at,
        }
    }
}

/// LocaleInfo
///
/// Locale configuration plus the locale negotiated for the caller's `Accept-Language`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct LocaleInfo {
    pub supported: Vec<String>,
    pub default: String,
    pub negotiated: String,
}

/// PageContext
///
/// What the page renderer receives once the gate lets a page request through.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PageContext {
    pub path: String,
    pub locale: Option<String>,
    pub subject: Option<Uuid>,
    pub role: Option<Role>,
}
