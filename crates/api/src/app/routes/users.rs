use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use keystone_auth::{Email, UserAccount, validate_password};
use keystone_core::UserId;
use keystone_infra::{AuditAction, AuditRecord, UserRepository};

use crate::app::dto::{ApiJson, CreateUserRequest, UpdateUserRequest, UserResponse, parse_id};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, RequestMeta, TenantContext};

async fn load_user(
    services: &AppServices,
    tenant: &TenantContext,
    raw_id: &str,
) -> Result<UserAccount, ApiError> {
    let id: UserId = parse_id(raw_id)?;
    services
        .repos
        .get_tenant_user(tenant.tenant_id(), id)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let users = services.repos.list_tenant_users(tenant.tenant_id()).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect::<Vec<_>>()))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.role.is_global_scope() {
        return Err(ApiError::validation("role must be user or tenant_admin"));
    }
    let email = Email::parse(&body.email)?;
    validate_password(&body.password)?;

    let hash = services.accounts.hash_password(&body.password).await?;
    let user = UserAccount::new(
        email,
        hash,
        &body.full_name,
        body.role,
        Some(tenant.tenant_id()),
        Utc::now(),
    )?;

    services
        .repos
        .create_tenant_user(tenant.tenant_id(), &user, tenant.tenant().max_users)
        .await?;

    services.audit(
        AuditRecord::new(AuditAction::CreateUser, "user")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(user.id)
            .ip(meta.ip_address),
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = load_user(&services, &tenant, &id).await?;

    if user.id == principal.user_id() {
        if body.is_active == Some(false) {
            return Err(ApiError::validation("you cannot deactivate your own account"));
        }
        if body.role.is_some_and(|role| role != user.role) {
            return Err(ApiError::validation("you cannot change your own role"));
        }
    }

    if let Some(full_name) = body.full_name.as_deref() {
        user.rename(full_name)?;
    }
    if let Some(role) = body.role {
        user.change_role(role)?;
    }

    if body.is_active == Some(true) {
        services
            .repos
            .reactivate_tenant_user(tenant.tenant_id(), &user, tenant.tenant().max_users)
            .await?;
        user.set_active(true);
    } else {
        if let Some(active) = body.is_active {
            user.set_active(active);
        }
        services.repos.update_tenant_user(tenant.tenant_id(), &user).await?;
    }

    services.audit(
        AuditRecord::new(AuditAction::UpdateUser, "user")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(user.id)
            .ip(meta.ip_address),
    );
    Ok(Json(UserResponse::from(&user)))
}

/// Soft delete: the account is deactivated, never removed.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = load_user(&services, &tenant, &id).await?;
    if user.id == principal.user_id() {
        return Err(ApiError::validation("you cannot deactivate your own account"));
    }

    user.set_active(false);
    services.repos.update_tenant_user(tenant.tenant_id(), &user).await?;

    services.audit(
        AuditRecord::new(AuditAction::DeactivateUser, "user")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(user.id)
            .ip(meta.ip_address),
    );
    Ok(Json(UserResponse::from(&user)))
}
