//! Core data type definitions

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type IdentityId = u64;
pub type RoleId = u64;
pub type ModuleId = u64;

/// Role name that grants full administrative access
pub const ADMINISTRATOR_ROLE: &str = "administrator";
/// Role name that grants module management access
pub const MANAGER_ROLE: &str = "manager";

/// Authenticated session held by the console
///
/// `authenticated == true` implies both `token` and `identity_id` are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub identity_id: Option<IdentityId>,
    pub authenticated: bool,
}

impl Session {
    /// Build an authenticated session from a login grant
    pub fn from_grant(grant: &LoginGrant) -> Self {
        Self {
            token: Some(grant.token.clone()),
            refresh_token: Some(grant.refresh_token.clone()),
            identity_id: Some(grant.user.id),
            authenticated: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Session::default()
    }

    /// Whether the invariant between the flag and the credentials holds
    pub fn is_consistent(&self) -> bool {
        !self.authenticated || (self.token.is_some() && self.identity_id.is_some())
    }
}

/// Credentials sent to the identity-login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Reference to the identity a login grant belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantedIdentity {
    pub id: IdentityId,
}

/// Successful identity-login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    pub id: u64,
    pub token: String,
    pub refresh_token: String,
    pub user: GrantedIdentity,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Entry of the shared role catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    #[serde(rename = "rolename")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn is_administrator(&self) -> bool {
        self.name == ADMINISTRATOR_ROLE
    }

    pub fn is_manager(&self) -> bool {
        self.name == MANAGER_ROLE
    }
}

/// One identity holding one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRoleAssignment {
    pub id: u64,
    #[serde(rename = "user")]
    pub identity_id: IdentityId,
    #[serde(rename = "role")]
    pub role_id: RoleId,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Installable feature module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub version: String,
    pub installed: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Console account as the identity directory lists it
///
/// Secrets the backend may echo back (password hash, tokens) are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    /// Ids of the roles held; names come from the role catalog
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields sent to create or update an identity; unset fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleId>>,
}

impl IdentityDraft {
    pub fn is_empty(&self) -> bool {
        self == &IdentityDraft::default()
    }
}

/// Response envelope every backend endpoint wraps its payload in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub messages: String,
}

/// Parse a backend timestamp
///
/// Accepts RFC 3339 and timezone-less ISO 8601 (read as UTC). Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

// Timestamps are informational; an unreadable one must not fail the whole payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(parse_timestamp))
}
