use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use keystone_core::{Tenant, TenantId};
use keystone_infra::{AuditAction, AuditRecord, RepositoryError, TenantRepository};

use crate::app::dto::{ApiJson, UpdatePlanRequest, UpdateStatusRequest, UpdateTenantRequest, parse_id};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, RequestMeta, TenantContext};

pub async fn get_my_tenant(tenant: TenantContext) -> Json<Tenant> {
    Json(tenant.tenant().clone())
}

pub async fn update_my_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    ApiJson(body): ApiJson<UpdateTenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = Tenant::normalize_name(&body.name)?;
    let updated = services
        .repos
        .rename_tenant(tenant.tenant_id(), &name)
        .await
        .map_err(tenant_not_found)?;

    services.audit(
        AuditRecord::new(AuditAction::UpdateTenant, "tenant")
            .tenant(Some(updated.id))
            .user(principal.user_id())
            .entity(updated.id)
            .ip(meta.ip_address),
    );
    Ok(Json(updated))
}

pub async fn list_tenants(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.repos.list_tenants().await?))
}

fn tenant_not_found(e: RepositoryError) -> ApiError {
    match e {
        RepositoryError::NotFound => ApiError::NotFound("tenant"),
        other => other.into(),
    }
}

pub async fn update_plan(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdatePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TenantId = parse_id(&id)?;
    let tenant = services
        .repos
        .set_tenant_plan(id, body.subscription_plan)
        .await
        .map_err(tenant_not_found)?;

    services.audit(
        AuditRecord::new(AuditAction::UpdateTenantPlan, "tenant")
            .tenant(Some(tenant.id))
            .user(principal.user_id())
            .entity(tenant.id)
            .ip(meta.ip_address),
    );
    Ok(Json(tenant))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TenantId = parse_id(&id)?;
    let tenant = services
        .repos
        .set_tenant_status(id, body.status)
        .await
        .map_err(tenant_not_found)?;

    services.audit(
        AuditRecord::new(AuditAction::UpdateTenantStatus, "tenant")
            .tenant(Some(tenant.id))
            .user(principal.user_id())
            .entity(tenant.id)
            .ip(meta.ip_address),
    );
    Ok(Json(tenant))
}
