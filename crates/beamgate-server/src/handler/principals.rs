//! Admin views over stored principals, their sessions, and their keys.

use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use serde::Deserialize;
use uuid::Uuid;

use beamgate_access::AccessService;
use beamgate_core::{ScopeSet, scopes};

use crate::extract::{AuthPrincipal, Json, Path};
use crate::handler::response::{ApiKeyCreatedResponse, PrincipalSummary};
use crate::handler::{ErrorKind, Result};
use crate::service::ServiceState;

/// Returns a [`Router`] with the principal administration routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/auth/principal", get(list_principals))
        .route("/auth/principal/{id}", get(inspect_principal))
        .route(
            "/auth/principal/{id}/session/revoke/{session_id}",
            delete(revoke_principal_session),
        )
        .route("/auth/principal/{id}/apikey", post(create_principal_api_key))
}

/// Lists every stored principal with sessions and keys.
async fn list_principals(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
) -> Result<Json<Vec<PrincipalSummary>>> {
    principal.require_scope(scopes::ADMIN_READ_PRINCIPALS)?;

    let overviews = access.principal_overviews().await?;
    Ok(Json(overviews.into_iter().map(Into::into).collect()))
}

/// Reports one stored principal.
async fn inspect_principal(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<PrincipalSummary>> {
    principal.require_scope(scopes::ADMIN_READ_PRINCIPALS)?;

    let overview = access
        .principal_overview(id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.with_resource("principal").into_static())?;
    Ok(Json(overview.into()))
}

/// Revokes a session on behalf of its owner.
///
/// The session must belong to the principal named in the path; a
/// session under a different owner reads as absent.
async fn revoke_principal_session(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Path((id, session_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    principal.require_scope(scopes::ADMIN_READ_PRINCIPALS)?;

    let overview = access
        .principal_overview(id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.with_resource("principal").into_static())?;
    let owned = overview
        .sessions
        .iter()
        .any(|session| session.id == session_id);
    if !owned || !access.revoke_session(&principal, session_id).await? {
        return Err(ErrorKind::NotFound.with_resource("session").into_static());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for minting a key on behalf of another principal.
#[derive(Debug, Deserialize)]
struct AdminKeyRequest {
    /// Fixed scope list for the key; cross-principal keys never inherit.
    scopes: ScopeSet,
    /// Key lifetime in seconds; omitted means the key never expires.
    expires_in: Option<u64>,
    note: Option<String>,
}

/// Mints a fixed-scope key for the principal named in the path.
async fn create_principal_api_key(
    State(access): State<AccessService>,
    principal: AuthPrincipal,
    Path(id): Path<Uuid>,
    Json(request): Json<AdminKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>)> {
    principal.require_scope(scopes::ADMIN_APIKEYS)?;

    let target = access
        .principal_by_id(id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.with_resource("principal").into_static())?;
    let issued = access
        .issue_api_key_for(
            &principal,
            &target,
            request.scopes,
            request.expires_in.map(Duration::from_secs),
            request.note,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(issued.into())))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use uuid::Uuid;

    use crate::handler::test::{bearer, create_test_server, login};

    /// Looks up a principal id through the admin list.
    async fn principal_id_of(server: &TestServer, admin_access: &str, username: &str) -> String {
        let list: Value = server
            .get("/auth/principal")
            .add_header("Authorization", bearer(admin_access))
            .await
            .json();
        list.as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["username"] == json!(username))
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn admin_lists_principals() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;
        let _ = login(&server, "carol", "carol_password").await;

        let response = server
            .get("/auth/principal")
            .add_header("Authorization", bearer(&bob_access))
            .await;
        response.assert_status_ok();

        let list: Value = response.json();
        let usernames: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["username"].as_str().unwrap())
            .collect();
        assert!(usernames.contains(&"bob"));
        assert!(usernames.contains(&"carol"));
        Ok(())
    }

    #[tokio::test]
    async fn non_admin_cannot_read_principals() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (carol_access, _) = login(&server, "carol", "carol_password").await;

        let response = server
            .get("/auth/principal")
            .add_header("Authorization", bearer(&carol_access))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_principal_is_not_found() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;

        let response = server
            .get(&format!("/auth/principal/{}", Uuid::new_v4()))
            .add_header("Authorization", bearer(&bob_access))
            .await;
        response.assert_status_not_found();
        Ok(())
    }

    #[tokio::test]
    async fn admin_revokes_another_users_session() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;
        let (_, carol_refresh) = login(&server, "carol", "carol_password").await;

        let carol_id = principal_id_of(&server, &bob_access, "carol").await;
        let carol: Value = server
            .get(&format!("/auth/principal/{carol_id}"))
            .add_header("Authorization", bearer(&bob_access))
            .await
            .json();
        let session_id = carol["sessions"][0]["id"].as_str().unwrap();

        let response = server
            .delete(&format!(
                "/auth/principal/{carol_id}/session/revoke/{session_id}"
            ))
            .add_header("Authorization", bearer(&bob_access))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .post("/auth/session/refresh")
            .json(&json!({"refresh_token": carol_refresh}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn session_under_the_wrong_principal_is_not_found() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;
        let _ = login(&server, "carol", "carol_password").await;

        let bob_id = principal_id_of(&server, &bob_access, "bob").await;
        let carol_id = principal_id_of(&server, &bob_access, "carol").await;
        let carol: Value = server
            .get(&format!("/auth/principal/{carol_id}"))
            .add_header("Authorization", bearer(&bob_access))
            .await
            .json();
        let session_id = carol["sessions"][0]["id"].as_str().unwrap();

        let response = server
            .delete(&format!(
                "/auth/principal/{bob_id}/session/revoke/{session_id}"
            ))
            .add_header("Authorization", bearer(&bob_access))
            .await;
        response.assert_status_not_found();
        Ok(())
    }

    #[tokio::test]
    async fn admin_issues_a_scoped_key_for_another_user() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;
        let _ = login(&server, "carol", "carol_password").await;

        let carol_id = principal_id_of(&server, &bob_access, "carol").await;
        let response = server
            .post(&format!("/auth/principal/{carol_id}/apikey"))
            .add_header("Authorization", bearer(&bob_access))
            .json(&json!({"scopes": ["read:status"], "note": "kiosk"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        let secret = body["secret"].as_str().unwrap();
        assert_eq!(body["scopes"], json!(["read:status"]));

        // The key authenticates as its owner, pinned to the snapshot.
        let whoami: Value = server
            .get("/auth/whoami")
            .add_header("Authorization", bearer(secret))
            .await
            .json();
        assert_eq!(whoami["username"], json!("carol"));
        assert_eq!(whoami["scopes"], json!(["read:status"]));
        Ok(())
    }

    #[tokio::test]
    async fn admin_key_must_fit_the_targets_scopes() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;
        let _ = login(&server, "carol", "carol_password").await;

        let carol_id = principal_id_of(&server, &bob_access, "carol").await;
        let response = server
            .post(&format!("/auth/principal/{carol_id}/apikey"))
            .add_header("Authorization", bearer(&bob_access))
            .json(&json!({"scopes": ["write:queue:edit"]}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn cross_principal_keys_require_the_admin_scope() -> anyhow::Result<()> {
        let server = create_test_server()?;
        let (dave_access, _) = login(&server, "dave", "dave_password").await;
        let (bob_access, _) = login(&server, "bob", "bob_password").await;

        let bob_id = principal_id_of(&server, &bob_access, "bob").await;
        let response = server
            .post(&format!("/auth/principal/{bob_id}/apikey"))
            .add_header("Authorization", bearer(&dave_access))
            .json(&json!({"scopes": ["read:status"]}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        Ok(())
    }
}
