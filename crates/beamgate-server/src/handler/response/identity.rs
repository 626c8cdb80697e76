//! Wire shapes for identity introspection responses.

use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use beamgate_access::{ApiKeyRecord, ApiKeyScopes, IssuedApiKey, PrincipalOverview, SessionRecord};
use beamgate_core::ScopeSet;

/// One login session as reported to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked: bool,
}

impl From<SessionRecord> for SessionSummary {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            expires_at: record.expires_at,
            revoked: record.revoked,
        }
    }
}

/// One API key as reported to clients. The secret itself never appears.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySummary {
    /// Cleartext lookup index, usable as a `prefix` parameter.
    pub prefix: String,
    /// `"inherited"` or the fixed scope list.
    pub scopes: ApiKeyScopes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl From<ApiKeyRecord> for ApiKeySummary {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            prefix: record.index,
            scopes: record.scopes,
            note: record.note,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// The one response body that ever carries a key secret.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedResponse {
    /// The full secret. It is never shown again.
    pub secret: String,
    #[serde(flatten)]
    pub key: ApiKeySummary,
}

impl From<IssuedApiKey> for ApiKeyCreatedResponse {
    fn from(issued: IssuedApiKey) -> Self {
        Self {
            secret: issued.secret.reveal().to_owned(),
            key: issued.record.into(),
        }
    }
}

/// Everything the gateway knows about one principal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub provider: String,
    pub username: String,
    pub created_at: Timestamp,
    /// Roles under the current policy.
    pub roles: Vec<String>,
    /// Effective scopes under the current policy.
    pub scopes: ScopeSet,
    pub sessions: Vec<SessionSummary>,
    pub api_keys: Vec<ApiKeySummary>,
}

impl From<PrincipalOverview> for PrincipalSummary {
    fn from(overview: PrincipalOverview) -> Self {
        Self {
            id: overview.record.id,
            provider: overview.record.provider,
            username: overview.record.username,
            created_at: overview.record.created_at,
            roles: overview.roles,
            scopes: overview.scopes,
            sessions: overview.sessions.into_iter().map(Into::into).collect(),
            api_keys: overview.api_keys.into_iter().map(Into::into).collect(),
        }
    }
}
