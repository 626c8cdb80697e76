//! Scope-gated relay of HTTP endpoints onto manager methods.
//!
//! Every route here is the same handler over a table entry: check the
//! required scope, take the optional JSON payload, and pass the call to
//! the dispatcher. The manager's reply becomes the response body as-is;
//! dispatcher faults surface through the shared error mapping.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde_json::{Value, json};

use beamgate_core::scopes;
use beamgate_dispatch::ManagerClient;

use crate::extract::{AuthPrincipal, Json};
use crate::handler::Result;
use crate::service::ServiceState;

/// Tracing target for forwarded manager calls.
const TRACING_TARGET: &str = "beamgate_server::handler::forwarding";

/// HTTP verb a forwarded route answers to.
#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Post,
}

/// Whether the caller's identity is stamped into the payload.
///
/// Queue items record who submitted them; the manager trusts the
/// gateway for those fields, so they are overwritten server-side and
/// never taken from the client.
#[derive(Debug, Clone, Copy)]
enum Identity {
    Keep,
    Stamp,
}

/// One table entry tying an HTTP route to a manager method.
#[derive(Debug, Clone, Copy)]
struct ForwardedRoute {
    path: &'static str,
    verb: Verb,
    scope: &'static str,
    method: &'static str,
    identity: Identity,
}

const fn relay(
    path: &'static str,
    verb: Verb,
    scope: &'static str,
    method: &'static str,
) -> ForwardedRoute {
    ForwardedRoute {
        path,
        verb,
        scope,
        method,
        identity: Identity::Keep,
    }
}

const fn relay_stamped(
    path: &'static str,
    scope: &'static str,
    method: &'static str,
) -> ForwardedRoute {
    ForwardedRoute {
        path,
        verb: Verb::Post,
        scope,
        method,
        identity: Identity::Stamp,
    }
}

/// The complete forwarding table.
const FORWARDED_ROUTES: &[ForwardedRoute] = &[
    relay("/ping", Verb::Get, scopes::READ_STATUS, "ping"),
    relay("/status", Verb::Get, scopes::READ_STATUS, "status"),
    relay("/queue/get", Verb::Get, scopes::READ_QUEUE, "queue_get"),
    relay("/queue/clear", Verb::Post, scopes::WRITE_QUEUE_EDIT, "queue_clear"),
    relay("/queue/start", Verb::Post, scopes::WRITE_QUEUE_CONTROL, "queue_start"),
    relay("/queue/stop", Verb::Post, scopes::WRITE_QUEUE_CONTROL, "queue_stop"),
    relay("/queue/stop/cancel", Verb::Post, scopes::WRITE_QUEUE_CONTROL, "queue_stop_cancel"),
    relay("/queue/mode/set", Verb::Post, scopes::WRITE_QUEUE_CONTROL, "queue_mode_set"),
    relay_stamped("/queue/item/add", scopes::WRITE_QUEUE_EDIT, "queue_item_add"),
    relay("/queue/item/get", Verb::Get, scopes::READ_QUEUE, "queue_item_get"),
    relay("/queue/item/remove", Verb::Post, scopes::WRITE_QUEUE_EDIT, "queue_item_remove"),
    relay("/queue/item/move", Verb::Post, scopes::WRITE_QUEUE_EDIT, "queue_item_move"),
    relay_stamped("/queue/item/update", scopes::WRITE_QUEUE_EDIT, "queue_item_update"),
    relay_stamped("/queue/item/execute", scopes::WRITE_EXECUTE, "queue_item_execute"),
    relay("/history/get", Verb::Get, scopes::READ_HISTORY, "history_get"),
    relay("/history/clear", Verb::Post, scopes::WRITE_HISTORY_EDIT, "history_clear"),
    relay("/environment/open", Verb::Post, scopes::WRITE_MANAGER_CONTROL, "environment_open"),
    relay("/environment/close", Verb::Post, scopes::WRITE_MANAGER_CONTROL, "environment_close"),
    relay("/environment/destroy", Verb::Post, scopes::WRITE_MANAGER_CONTROL, "environment_destroy"),
    relay("/re/pause", Verb::Post, scopes::WRITE_PLAN_CONTROL, "re_pause"),
    relay("/re/resume", Verb::Post, scopes::WRITE_PLAN_CONTROL, "re_resume"),
    relay("/re/stop", Verb::Post, scopes::WRITE_PLAN_CONTROL, "re_stop"),
    relay("/re/abort", Verb::Post, scopes::WRITE_PLAN_CONTROL, "re_abort"),
    relay("/re/halt", Verb::Post, scopes::WRITE_PLAN_CONTROL, "re_halt"),
    relay("/plans/allowed", Verb::Get, scopes::READ_RESOURCES, "plans_allowed"),
    relay("/devices/allowed", Verb::Get, scopes::READ_RESOURCES, "devices_allowed"),
    relay("/permissions/get", Verb::Get, scopes::READ_CONFIG, "permissions_get"),
    relay("/permissions/set", Verb::Post, scopes::WRITE_PERMISSIONS, "permissions_set"),
    relay("/permissions/reload", Verb::Post, scopes::WRITE_CONFIG, "permissions_reload"),
    relay("/manager/stop", Verb::Post, scopes::WRITE_MANAGER_STOP, "manager_stop"),
];

/// Returns a [`Router`] with every forwarded manager endpoint.
pub fn routes() -> Router<ServiceState> {
    let mut router = Router::new();
    for route in FORWARDED_ROUTES {
        let handler = move |State(manager): State<ManagerClient>,
                            principal: AuthPrincipal,
                            payload: Option<Json<Value>>| {
            forward(route, manager, principal, payload)
        };
        router = match route.verb {
            Verb::Get => router.route(route.path, get(handler)),
            Verb::Post => router.route(route.path, post(handler)),
        };
    }
    router
}

/// Relays one request to the manager and the reply back.
async fn forward(
    route: &'static ForwardedRoute,
    manager: ManagerClient,
    principal: AuthPrincipal,
    payload: Option<Json<Value>>,
) -> Result<Json<Value>> {
    principal.require_scope(route.scope)?;

    let mut params = payload.map(Json::into_inner).unwrap_or_else(|| json!({}));
    if let (Identity::Stamp, Some(object)) = (route.identity, params.as_object_mut()) {
        object.insert("user".to_owned(), json!(principal.visible_name()));
        object.insert(
            "user_group".to_owned(),
            json!(principal.primary_role().unwrap_or_default()),
        );
    }

    tracing::debug!(
        target: TRACING_TARGET,
        method = route.method,
        username = %principal.username,
        "forwarding to manager"
    );

    let reply = manager.call(route.method, params).await?;
    Ok(Json(reply))
}
