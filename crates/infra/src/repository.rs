//! Persistence contracts.
//!
//! Every tenant-scoped method takes the caller's `TenantId` as its first
//! argument and must filter on it; a row of another tenant is reported exactly
//! like a row that does not exist.

use thiserror::Error;

use keystone_auth::{Email, UserAccount};
use keystone_core::{
    ProjectId, Subdomain, SubscriptionPlan, TaskId, Tenant, TenantId, TenantStatus, UserId,
};
use keystone_projects::{Project, Task};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("subdomain already registered")]
    DuplicateSubdomain,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("record not found")]
    NotFound,

    /// A plan ceiling would be exceeded by the write.
    #[error("plan limit reached: at most {limit} {resource}")]
    LimitReached { resource: &'static str, limit: u32 },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait::async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get_tenant(&self, id: TenantId) -> RepositoryResult<Option<Tenant>>;

    async fn find_tenant_by_subdomain(&self, subdomain: &Subdomain) -> RepositoryResult<Option<Tenant>>;

    /// All tenants, oldest first. Only ever called for a global scope.
    async fn list_tenants(&self) -> RepositoryResult<Vec<Tenant>>;

    // Each write touches only its own columns and returns the row as stored,
    // so a concurrent status change is never overwritten by a stale copy.

    async fn rename_tenant(&self, id: TenantId, name: &str) -> RepositoryResult<Tenant>;

    async fn set_tenant_status(&self, id: TenantId, status: TenantStatus) -> RepositoryResult<Tenant>;

    /// Switch plan; `max_users` and `max_projects` move with it.
    async fn set_tenant_plan(&self, id: TenantId, plan: SubscriptionPlan) -> RepositoryResult<Tenant>;
}

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    /// Global lookup used by login; emails are unique across tenants.
    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<UserAccount>>;

    /// Lookup by id without tenant filtering; only for the principal's own record.
    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<UserAccount>>;

    async fn get_tenant_user(&self, tenant_id: TenantId, id: UserId) -> RepositoryResult<Option<UserAccount>>;

    async fn list_tenant_users(&self, tenant_id: TenantId) -> RepositoryResult<Vec<UserAccount>>;

    /// Insert a tenant user, failing with `LimitReached` when the tenant
    /// already has `max_users` active users.
    async fn create_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()>;

    async fn update_tenant_user(&self, tenant_id: TenantId, user: &UserAccount) -> RepositoryResult<()>;

    /// Persist `user` as active. When the stored account is inactive the
    /// `max_users` ceiling is checked under the same lock as
    /// `create_tenant_user`.
    async fn reactivate_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()>;

    async fn create_super_admin(&self, user: &UserAccount) -> RepositoryResult<()>;
}

#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Create a tenant and its first admin atomically: either both rows exist
    /// afterwards or neither does.
    async fn create_tenant_with_admin(&self, tenant: &Tenant, admin: &UserAccount) -> RepositoryResult<()>;
}

#[async_trait::async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Projects of a tenant, newest first.
    async fn list_projects(&self, tenant_id: TenantId) -> RepositoryResult<Vec<Project>>;

    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<Option<Project>>;

    async fn create_project(
        &self,
        tenant_id: TenantId,
        project: &Project,
        max_projects: u32,
    ) -> RepositoryResult<()>;

    async fn update_project(&self, tenant_id: TenantId, project: &Project) -> RepositoryResult<()>;

    /// Delete a project together with its tasks.
    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<()>;
}

#[async_trait::async_trait]
pub trait TaskRepository: Send + Sync {
    /// Tasks of one project, oldest first.
    async fn list_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> RepositoryResult<Vec<Task>>;

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<Option<Task>>;

    /// Fails with `NotFound` when the owning project is not in `tenant_id`.
    async fn create_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()>;

    async fn update_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()>;

    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<()>;
}

/// Every repository a request handler may need, behind one object.
pub trait Repositories:
    TenantRepository + UserRepository + RegistrationStore + ProjectRepository + TaskRepository
{
}

impl<T> Repositories for T where
    T: TenantRepository + UserRepository + RegistrationStore + ProjectRepository + TaskRepository
{
}
