//! In-memory store for tests/dev.
//!
//! All collections sit behind one lock so multi-row writes (registration,
//! ceiling-checked inserts, cascading deletes) are atomic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use keystone_auth::{Email, UserAccount};
use keystone_core::{
    ProjectId, Subdomain, SubscriptionPlan, TaskId, Tenant, TenantId, TenantStatus, UserId,
};
use keystone_projects::{Project, Task};

use crate::repository::{
    ProjectRepository, RegistrationStore, RepositoryError, RepositoryResult, TaskRepository,
    TenantRepository, UserRepository,
};

#[derive(Debug, Default)]
struct State {
    tenants: HashMap<TenantId, Tenant>,
    users: HashMap<UserId, UserAccount>,
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
}

impl State {
    fn email_taken(&self, email: &Email) -> bool {
        self.users.values().any(|u| &u.email == email)
    }

    fn subdomain_taken(&self, subdomain: &Subdomain) -> bool {
        self.tenants.values().any(|t| &t.subdomain == subdomain)
    }

    fn active_users(&self, tenant_id: TenantId) -> u32 {
        let n = self
            .users
            .values()
            .filter(|u| u.tenant_id == Some(tenant_id) && u.is_active)
            .count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    fn project_count(&self, tenant_id: TenantId) -> u32 {
        let n = self.projects.values().filter(|p| p.tenant_id == tenant_id).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    fn owns_project(&self, tenant_id: TenantId, id: ProjectId) -> bool {
        self.projects.get(&id).is_some_and(|p| p.tenant_id == tenant_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }

    /// Apply `change` to the stored tenant under the write lock.
    fn modify_tenant<F>(&self, id: TenantId, change: F) -> RepositoryResult<Tenant>
    where
        F: FnOnce(&mut Tenant),
    {
        let mut state = self.write()?;
        let stored = state.tenants.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        change(stored);
        Ok(stored.clone())
    }
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryStore {
    async fn get_tenant(&self, id: TenantId) -> RepositoryResult<Option<Tenant>> {
        Ok(self.read()?.tenants.get(&id).cloned())
    }

    async fn find_tenant_by_subdomain(&self, subdomain: &Subdomain) -> RepositoryResult<Option<Tenant>> {
        Ok(self
            .read()?
            .tenants
            .values()
            .find(|t| &t.subdomain == subdomain)
            .cloned())
    }

    async fn list_tenants(&self) -> RepositoryResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.read()?.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tenants)
    }

    async fn rename_tenant(&self, id: TenantId, name: &str) -> RepositoryResult<Tenant> {
        self.modify_tenant(id, |t| t.name = name.to_string())
    }

    async fn set_tenant_status(&self, id: TenantId, status: TenantStatus) -> RepositoryResult<Tenant> {
        self.modify_tenant(id, |t| t.set_status(status))
    }

    async fn set_tenant_plan(&self, id: TenantId, plan: SubscriptionPlan) -> RepositoryResult<Tenant> {
        self.modify_tenant(id, |t| t.change_plan(plan))
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<UserAccount>> {
        Ok(self.read()?.users.values().find(|u| &u.email == email).cloned())
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<UserAccount>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_tenant_user(&self, tenant_id: TenantId, id: UserId) -> RepositoryResult<Option<UserAccount>> {
        Ok(self
            .read()?
            .users
            .get(&id)
            .filter(|u| u.tenant_id == Some(tenant_id))
            .cloned())
    }

    async fn list_tenant_users(&self, tenant_id: TenantId) -> RepositoryResult<Vec<UserAccount>> {
        let mut users: Vec<UserAccount> = self
            .read()?
            .users
            .values()
            .filter(|u| u.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn create_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()> {
        if user.tenant_id != Some(tenant_id) {
            return Err(RepositoryError::NotFound);
        }
        let mut state = self.write()?;
        if !state.tenants.contains_key(&tenant_id) {
            return Err(RepositoryError::NotFound);
        }
        if state.email_taken(&user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        if state.active_users(tenant_id) >= max_users {
            return Err(RepositoryError::LimitReached { resource: "users", limit: max_users });
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_tenant_user(&self, tenant_id: TenantId, user: &UserAccount) -> RepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .users
            .get_mut(&user.id)
            .filter(|u| u.tenant_id == Some(tenant_id))
            .ok_or(RepositoryError::NotFound)?;
        stored.full_name = user.full_name.clone();
        stored.role = user.role;
        stored.is_active = user.is_active;
        Ok(())
    }

    async fn reactivate_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()> {
        let mut state = self.write()?;
        let was_active = state
            .users
            .get(&user.id)
            .filter(|u| u.tenant_id == Some(tenant_id))
            .map(|u| u.is_active)
            .ok_or(RepositoryError::NotFound)?;
        if !was_active && state.active_users(tenant_id) >= max_users {
            return Err(RepositoryError::LimitReached { resource: "users", limit: max_users });
        }
        let stored = state.users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        stored.full_name = user.full_name.clone();
        stored.role = user.role;
        stored.is_active = true;
        Ok(())
    }

    async fn create_super_admin(&self, user: &UserAccount) -> RepositoryResult<()> {
        let mut state = self.write()?;
        if state.email_taken(&user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryStore {
    async fn create_tenant_with_admin(&self, tenant: &Tenant, admin: &UserAccount) -> RepositoryResult<()> {
        let mut state = self.write()?;
        if state.subdomain_taken(&tenant.subdomain) {
            return Err(RepositoryError::DuplicateSubdomain);
        }
        if state.email_taken(&admin.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        state.tenants.insert(tenant.id, tenant.clone());
        state.users.insert(admin.id, admin.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProjectRepository for InMemoryStore {
    async fn list_projects(&self, tenant_id: TenantId) -> RepositoryResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .read()?
            .projects
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<Option<Project>> {
        Ok(self
            .read()?
            .projects
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    async fn create_project(
        &self,
        tenant_id: TenantId,
        project: &Project,
        max_projects: u32,
    ) -> RepositoryResult<()> {
        if project.tenant_id != tenant_id {
            return Err(RepositoryError::NotFound);
        }
        let mut state = self.write()?;
        if state.project_count(tenant_id) >= max_projects {
            return Err(RepositoryError::LimitReached { resource: "projects", limit: max_projects });
        }
        state.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn update_project(&self, tenant_id: TenantId, project: &Project) -> RepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .projects
            .get_mut(&project.id)
            .filter(|p| p.tenant_id == tenant_id)
            .ok_or(RepositoryError::NotFound)?;
        stored.name = project.name.clone();
        stored.description = project.description.clone();
        stored.status = project.status;
        stored.updated_at = project.updated_at;
        Ok(())
    }

    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<()> {
        let mut state = self.write()?;
        if !state.owns_project(tenant_id, id) {
            return Err(RepositoryError::NotFound);
        }
        state.projects.remove(&id);
        state.tasks.retain(|_, t| t.project_id != id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryStore {
    async fn list_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> RepositoryResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .read()?
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<Option<Task>> {
        Ok(self
            .read()?
            .tasks
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn create_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()> {
        let mut state = self.write()?;
        if task.tenant_id != tenant_id || !state.owns_project(tenant_id, task.project_id) {
            return Err(RepositoryError::NotFound);
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .tasks
            .get_mut(&task.id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or(RepositoryError::NotFound)?;
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.status = task.status;
        stored.assignee = task.assignee;
        stored.updated_at = task.updated_at;
        Ok(())
    }

    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<()> {
        let mut state = self.write()?;
        match state.tasks.get(&id) {
            Some(t) if t.tenant_id == tenant_id => {
                state.tasks.remove(&id);
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }
}
