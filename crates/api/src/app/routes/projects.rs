use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use keystone_core::ProjectId;
use keystone_infra::{AuditAction, AuditRecord, ProjectRepository};
use keystone_projects::{Project, ProjectChanges};

use crate::app::dto::{ApiJson, CreateProjectRequest, UpdateProjectRequest, parse_id};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, RequestMeta, TenantContext};

pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.repos.list_projects(tenant.tenant_id()).await?))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    ApiJson(body): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = Project::create(
        tenant.tenant_id(),
        &body.name,
        body.description,
        principal.user_id(),
        Utc::now(),
    )?;

    services
        .repos
        .create_project(tenant.tenant_id(), &project, tenant.tenant().max_projects)
        .await?;

    services.audit(
        AuditRecord::new(AuditAction::CreateProject, "project")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(project.id)
            .ip(meta.ip_address),
    );
    Ok((StatusCode::CREATED, Json(project)))
}

/// Load a project of the caller's tenant; anything else is a 404.
pub(super) async fn load_project(
    services: &AppServices,
    tenant: &TenantContext,
    raw_id: &str,
) -> Result<Project, ApiError> {
    let id: ProjectId = parse_id(raw_id)?;
    services
        .repos
        .get_project(tenant.tenant_id(), id)
        .await?
        .ok_or(ApiError::NotFound("project"))
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_project(&services, &tenant, &id).await?))
}

pub async fn update_project(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut project = load_project(&services, &tenant, &id).await?;
    project.apply(
        ProjectChanges {
            name: body.name,
            description: body.description,
            status: body.status,
        },
        Utc::now(),
    )?;
    services.repos.update_project(tenant.tenant_id(), &project).await?;

    services.audit(
        AuditRecord::new(AuditAction::UpdateProject, "project")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(project.id)
            .ip(meta.ip_address),
    );
    Ok(Json(project))
}

pub async fn delete_project(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&services, &tenant, &id).await?;
    services.repos.delete_project(tenant.tenant_id(), project.id).await?;

    services.audit(
        AuditRecord::new(AuditAction::DeleteProject, "project")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(project.id)
            .ip(meta.ip_address),
    );
    Ok(StatusCode::NO_CONTENT)
}
