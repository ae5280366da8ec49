//! Request gates, applied in order: session, role, tenant.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use keystone_auth::{Role, TokenVerifier, authorize, bind_scope, resolve_session};
use keystone_core::TenantId;
use keystone_infra::TenantRepository;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Client-supplied tenant id. Never used for scoping; a mismatch is only logged.
pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Resolve the bearer token into a [`PrincipalContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = resolve_session(state.verifier.as_ref(), header, Utc::now()).map_err(|e| {
        warn!(reason = %e.reason, path = %req.uri().path(), "authentication rejected");
        ApiError::Unauthenticated
    })?;

    req.extensions_mut().insert(PrincipalContext::new(principal));
    Ok(next.run(req).await)
}

/// Roles admitted by a [`require_roles`] layer.
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

pub async fn require_roles(
    State(AllowedRoles(allowed)): State<AllowedRoles>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .ok_or(ApiError::Unauthenticated)?;

    if let Err(e) = authorize(principal.principal(), allowed) {
        warn!(
            user_id = %principal.user_id(),
            path = %req.uri().path(),
            error = %e,
            "authorization denied"
        );
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Bind the request to the principal's tenant and re-check that it is active.
///
/// Inserts a [`TenantContext`] for tenant-scoped principals; a global
/// principal passes through without one.
pub async fn tenant_gate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .cloned()
        .ok_or(ApiError::Unauthenticated)?;

    let requested = req
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<TenantId>().ok());

    let tenant = match principal.principal().tenant_id() {
        Some(id) => services.repos.get_tenant(id).await?,
        None => None,
    };

    bind_scope(principal.principal(), requested, |_| tenant.as_ref().map(|t| t.status)).map_err(
        |e| {
            warn!(user_id = %principal.user_id(), error = %e, "tenant gate denied");
            ApiError::from(e)
        },
    )?;

    if let Some(tenant) = tenant {
        req.extensions_mut().insert(TenantContext::new(tenant));
    }
    Ok(next.run(req).await)
}
