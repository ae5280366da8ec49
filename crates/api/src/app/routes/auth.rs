use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use keystone_infra::{AuditAction, AuditRecord, LoginRequest, TenantRegistration, TenantRepository, UserRepository};

use crate::app::dto::{
    ApiJson, LoginBody, LoginResponse, MeResponse, RegisterTenantRequest, RegisterTenantResponse,
    TenantSummary, UserResponse,
};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, RequestMeta};

pub async fn register_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    meta: RequestMeta,
    ApiJson(body): ApiJson<RegisterTenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registered = services
        .accounts
        .register_tenant(
            TenantRegistration {
                tenant_name: body.tenant_name,
                subdomain: body.subdomain,
                admin_email: body.admin_email,
                admin_full_name: body.admin_full_name,
                admin_password: body.admin_password,
            },
            meta.ip_address,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterTenantResponse {
            tenant_id: registered.tenant.id,
            subdomain: registered.tenant.subdomain.as_str().to_string(),
            admin: UserResponse::from(&registered.admin),
        }),
    ))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    meta: RequestMeta,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = services
        .accounts
        .login(
            LoginRequest {
                email: body.email,
                password: body.password,
                tenant_subdomain: body.tenant_subdomain.filter(|s| !s.trim().is_empty()),
            },
            meta.ip_address,
        )
        .await?;

    Ok(Json(LoginResponse {
        token: outcome.token.token,
        expires_at: outcome.token.claims.expires_at,
        user: UserResponse::from(&outcome.user),
        tenant: outcome.tenant.as_ref().map(TenantSummary::from),
    }))
}

/// The caller's current account, re-read from storage.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Result<impl IntoResponse, ApiError> {
    let user = services
        .repos
        .get_user(principal.user_id())
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthenticated)?;

    let tenant = match user.tenant_id {
        Some(id) => services.repos.get_tenant(id).await?,
        None => None,
    };

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
        tenant: tenant.as_ref().map(TenantSummary::from),
    }))
}

/// Tokens are stateless; logout only leaves a trail.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    meta: RequestMeta,
) -> impl IntoResponse {
    services.audit(
        AuditRecord::new(AuditAction::Logout, "user")
            .tenant(principal.principal().tenant_id())
            .user(principal.user_id())
            .entity(principal.user_id())
            .ip(meta.ip_address),
    );
    Json(json!({ "message": "logged out" }))
}
