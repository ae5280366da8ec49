use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use keystone_core::{TaskId, UserId};
use keystone_infra::{AuditAction, AuditRecord, TaskRepository, UserRepository};
use keystone_projects::{Task, TaskChanges};

use super::projects::load_project;
use crate::app::dto::{ApiJson, CreateTaskRequest, UpdateTaskRequest, parse_id};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, RequestMeta, TenantContext};

/// Assignees must be active members of the same tenant.
async fn check_assignee(
    services: &AppServices,
    tenant: &TenantContext,
    assignee: Option<UserId>,
) -> Result<(), ApiError> {
    let Some(id) = assignee else {
        return Ok(());
    };
    match services.repos.get_tenant_user(tenant.tenant_id(), id).await? {
        Some(user) if user.is_active => Ok(()),
        _ => Err(ApiError::validation("assignee is not an active member of this tenant")),
    }
}

async fn load_task(services: &AppServices, tenant: &TenantContext, raw_id: &str) -> Result<Task, ApiError> {
    let id: TaskId = parse_id(raw_id)?;
    services
        .repos
        .get_task(tenant.tenant_id(), id)
        .await?
        .ok_or(ApiError::NotFound("task"))
}

pub async fn list_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: TenantContext,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&services, &tenant, &project_id).await?;
    Ok(Json(services.repos.list_tasks(tenant.tenant_id(), project.id).await?))
}

pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&services, &tenant, &project_id).await?;
    check_assignee(&services, &tenant, body.assignee_id).await?;

    let task = Task::create(
        &project,
        &body.title,
        body.description,
        body.status,
        body.assignee_id,
        Utc::now(),
    )?;
    services.repos.create_task(tenant.tenant_id(), &task).await?;

    services.audit(
        AuditRecord::new(AuditAction::CreateTask, "task")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(task.id)
            .ip(meta.ip_address),
    );
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut task = load_task(&services, &tenant, &id).await?;
    if let Some(assignee) = body.assignee_id {
        check_assignee(&services, &tenant, assignee).await?;
    }

    task.apply(
        TaskChanges {
            title: body.title,
            description: body.description,
            status: body.status,
            assignee: body.assignee_id,
        },
        Utc::now(),
    )?;
    services.repos.update_task(tenant.tenant_id(), &task).await?;

    services.audit(
        AuditRecord::new(AuditAction::UpdateTask, "task")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(task.id)
            .ip(meta.ip_address),
    );
    Ok(Json(task))
}

pub async fn delete_task(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&services, &tenant, &id).await?;
    services.repos.delete_task(tenant.tenant_id(), task.id).await?;

    services.audit(
        AuditRecord::new(AuditAction::DeleteTask, "task")
            .tenant(Some(tenant.tenant_id()))
            .user(principal.user_id())
            .entity(task.id)
            .ip(meta.ip_address),
    );
    Ok(StatusCode::NO_CONTENT)
}
