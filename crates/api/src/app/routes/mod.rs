use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};

use keystone_auth::Role;

use crate::app::services::AppServices;
use crate::middleware::{AllowedRoles, require_roles, tenant_gate};

pub mod auth;
pub mod projects;
pub mod system;
pub mod tasks;
pub mod tenants;
pub mod users;

const SUPER_ADMIN: &[Role] = &[Role::SuperAdmin];
const TENANT_ADMIN: &[Role] = &[Role::TenantAdmin];
const TENANT_MEMBERS: &[Role] = &[Role::TenantAdmin, Role::User];

/// Role gate only; used for global (super admin) endpoints.
fn role_gated(route: MethodRouter, roles: &'static [Role]) -> MethodRouter {
    route.route_layer(from_fn_with_state(AllowedRoles(roles), require_roles))
}

/// Role gate, then tenant gate. The later `route_layer` is the outer one.
fn tenant_gated(route: MethodRouter, roles: &'static [Role], services: &Arc<AppServices>) -> MethodRouter {
    route
        .route_layer(from_fn_with_state(services.clone(), tenant_gate))
        .route_layer(from_fn_with_state(AllowedRoles(roles), require_roles))
}

/// Public endpoints; no session required.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register-tenant", post(auth::register_tenant))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints. The session layer is applied by the caller.
pub fn router(services: &Arc<AppServices>) -> Router {
    let s = services;
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // tenants
        .route("/tenants", role_gated(get(tenants::list_tenants), SUPER_ADMIN))
        .route("/tenants/me", tenant_gated(get(tenants::get_my_tenant), TENANT_MEMBERS, s))
        .route("/tenants/me", tenant_gated(put(tenants::update_my_tenant), TENANT_ADMIN, s))
        .route("/tenants/:id/plan", role_gated(patch(tenants::update_plan), SUPER_ADMIN))
        .route("/tenants/:id/status", role_gated(patch(tenants::update_status), SUPER_ADMIN))
        // projects
        .route("/projects", tenant_gated(get(projects::list_projects), TENANT_MEMBERS, s))
        .route("/projects", tenant_gated(post(projects::create_project), TENANT_ADMIN, s))
        .route("/projects/:id", tenant_gated(get(projects::get_project), TENANT_MEMBERS, s))
        .route("/projects/:id", tenant_gated(put(projects::update_project), TENANT_ADMIN, s))
        .route("/projects/:id", tenant_gated(delete(projects::delete_project), TENANT_ADMIN, s))
        // tasks
        .route("/projects/:id/tasks", tenant_gated(get(tasks::list_tasks), TENANT_MEMBERS, s))
        .route("/projects/:id/tasks", tenant_gated(post(tasks::create_task), TENANT_MEMBERS, s))
        .route("/tasks/:id", tenant_gated(put(tasks::update_task), TENANT_MEMBERS, s))
        .route("/tasks/:id", tenant_gated(delete(tasks::delete_task), TENANT_ADMIN, s))
        // users
        .route("/users", tenant_gated(get(users::list_users), TENANT_ADMIN, s))
        .route("/users", tenant_gated(post(users::create_user), TENANT_ADMIN, s))
        .route("/users/:id", tenant_gated(patch(users::update_user), TENANT_ADMIN, s))
        .route("/users/:id", tenant_gated(delete(users::delete_user), TENANT_ADMIN, s))
}
