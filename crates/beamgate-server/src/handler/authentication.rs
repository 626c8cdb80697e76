//! Login, token, session, and API-key handlers.
//!
//! The token endpoints speak the OAuth-ish `snake_case` shapes clients
//! expect from a token exchange; introspection endpoints use the same
//! `camelCase` bodies as the rest of the gateway.

use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beamgate_access::apikey::{self, ApiKeyScopes};
use beamgate_access::{AccessService, ApiKeyRequest, Credential};
use beamgate_core::{Principal, ScopeSet, scopes};

use crate::extract::{AuthPrincipal, Form, Json, Path, Query};
use crate::handler::response::{ApiKeyCreatedResponse, ApiKeySummary, SessionSummary};
use crate::handler::{ErrorKind, Result};
use crate::service::ServiceState;

/// Tracing target for authentication operations.
const TRACING_TARGET: &str = "beamgate_server::handler::authentication";

/// Local alias for the bearer header extractor.
type AuthBearerHeader = TypedHeader<Authorization<Bearer>>;

/// Returns a [`Router`] with the authentication and introspection routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/auth/provider/{provider}/token", post(issue_token))
        .route("/auth/session/refresh", post(refresh_token))
        .route(
            "/auth/apikey",
            post(create_api_key).get(inspect_api_key).delete(delete_api_key),
        )
        .route("/auth/scopes", get(list_scopes))
        .route("/auth/whoami", get(whoami))
        .route("/auth/session/revoke/{session_id}", delete(revoke_session))
        .route("/logout", post(logout))
}

/// Credential form for the token endpoint.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Bearer token pair returned at login.
#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    /// Access-token lifetime in seconds.
    expires_in: u64,
}

/// Verifies a credential against the named provider and opens a session.
async fn issue_token(
    State(access): State<AccessService>,
    Path(provider): Path<String>,
    Form(request): Form<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let credential = Credential {
        username: request.username,
        password: request.password,
    };
    let principal = access.authenticate(&provider, &credential).await?;
    let pair = access.issue_tokens(&principal).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        username = %principal.username,
        provider = %provider,
        "login succeeded"
    );

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
        expires_in: pair.expires_in,
    }))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    access_token: String,
    token_type: &'static str,
    /// Access-token lifetime in seconds.
    expires_in: u64,
}

/// Exchanges a refresh token for a fresh access token.
async fn refresh_token(
    State(access): State<AccessService>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let grant = access.refresh(&request.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: grant.access_token,
        token_type: "bearer",
        expires_in: grant.expires_in,
    }))
}

/// Request body for minting an API key.
#[derive(Debug, Default, Deserialize)]
struct ApiKeyCreateRequest {
    /// Key lifetime in seconds; omitted means the key never expires.
    expires_in: Option<u64>,
    /// `"inherited"`, a scope list, or omitted for the default behavior.
    scopes: Option<ApiKeyScopes>,
    note: Option<String>,
}

impl ApiKeyCreateRequest {
    /// Lowers the wire shape into service parameters.
    fn into_request(self) -> ApiKeyRequest {
        ApiKeyRequest {
            expires_in: self.expires_in.map(Duration::from_secs),
            scopes: match self.scopes {
                Some(ApiKeyScopes::Fixed(scopes)) => Some(scopes),
                Some(ApiKeyScopes::Inherited) | None => None,
            },
            note: self.note,
        }
    }
}

/// Mints an API key for the calling principal.
async fn create_api_key(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    request: Option<Json<ApiKeyCreateRequest>>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>)> {
    principal.require_scope(scopes::USER_APIKEYS)?;

    let request = request.map(Json::into_inner).unwrap_or_default();
    let issued = access
        .issue_api_key(&principal, request.into_request())
        .await?;

    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// Query for addressing an API key by its cleartext prefix.
#[derive(Debug, Deserialize)]
struct ApiKeyQuery {
    prefix: Option<String>,
}

/// The lookup index addressed by the request: an explicit `?prefix`, or
/// the prefix of the API key that authenticated the caller.
fn addressed_index(query: ApiKeyQuery, bearer: Option<&AuthBearerHeader>) -> Result<String> {
    if let Some(prefix) = query.prefix {
        return Ok(prefix);
    }
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        let token = bearer.token();
        if apikey::looks_like_key(token) {
            return Ok(token[..apikey::INDEX_LEN].to_owned());
        }
    }
    Err(ErrorKind::BadRequest
        .with_message("Pass ?prefix or authenticate with the key to address.")
        .into_static())
}

/// Reports an API key visible to the caller.
async fn inspect_api_key(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Query(query): Query<ApiKeyQuery>,
    bearer: Option<AuthBearerHeader>,
) -> Result<Json<ApiKeySummary>> {
    let index = addressed_index(query, bearer.as_ref())?;
    let record = access
        .api_key_info(&principal, &index)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.with_resource("apikey").into_static())?;
    Ok(Json(record.into()))
}

/// Revokes an API key visible to the caller.
async fn delete_api_key(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Query(query): Query<ApiKeyQuery>,
    bearer: Option<AuthBearerHeader>,
) -> Result<StatusCode> {
    let index = addressed_index(query, bearer.as_ref())?;
    if !access.revoke_api_key(&principal, &index).await? {
        return Err(ErrorKind::NotFound.with_resource("apikey").into_static());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopesResponse {
    roles: Vec<String>,
    scopes: ScopeSet,
}

/// Reports the roles and effective scopes of the current request.
async fn list_scopes(principal: AuthPrincipal) -> Json<ScopesResponse> {
    let principal = principal.into_inner();
    Json(ScopesResponse {
        roles: principal.roles,
        scopes: principal.scopes,
    })
}

/// Full identity summary of the caller.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoamiResponse {
    #[serde(flatten)]
    principal: Principal,
    sessions: Vec<SessionSummary>,
    api_keys: Vec<ApiKeySummary>,
}

/// Reports everything the gateway knows about the caller.
async fn whoami(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
) -> Result<Json<WhoamiResponse>> {
    let (sessions, api_keys) = match access.principal_overview(principal.id).await? {
        Some(overview) => (
            overview.sessions.into_iter().map(Into::into).collect(),
            overview.api_keys.into_iter().map(Into::into).collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(Json(WhoamiResponse {
        principal: principal.into_inner(),
        sessions,
        api_keys,
    }))
}

/// Revokes a session owned by the caller.
async fn revoke_session(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    if !access.revoke_session(&principal, session_id).await? {
        return Err(ErrorKind::NotFound.with_resource("session").into_static());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutResponse {
    success: bool,
    message: &'static str,
}

/// Confirms logout. Tokens are stateless, so the caller discards them.
async fn logout(principal: AuthPrincipal) -> Json<LogoutResponse> {
    tracing::debug!(
        target: TRACING_TARGET,
        username = %principal.username,
        "logout"
    );
    Json(LogoutResponse {
        success: true,
        message: "Discard the tokens client-side to complete logout.",
    })
}
