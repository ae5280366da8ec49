//! Postgres-backed store.
//!
//! Runtime-checked queries only (no compile-time database access). Every
//! tenant-owned query carries `tenant_id` in its WHERE clause, so a row of
//! another tenant is indistinguishable from a missing one.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | Constraint | RepositoryError |
//! |------------|----------------------|------------|-----------------|
//! | Database (unique violation) | `23505` | `tenants_subdomain_key` | `DuplicateSubdomain` |
//! | Database (unique violation) | `23505` | `users_email_key` | `DuplicateEmail` |
//! | anything else | any | any | `Storage` |

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use keystone_auth::{Email, Role, UserAccount};
use keystone_core::{
    ProjectId, Subdomain, SubscriptionPlan, TaskId, Tenant, TenantId, TenantStatus, UserId,
};
use keystone_projects::{Project, Task};

use crate::audit::{AuditError, AuditRecord, AuditSink};
use crate::repository::{
    ProjectRepository, RegistrationStore, RepositoryError, RepositoryResult, TaskRepository,
    TenantRepository, UserRepository,
};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Every statement is idempotent.
    pub async fn apply_schema(&self) -> RepositoryResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> RepositoryResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Lock the tenant row for the rest of the transaction so concurrent
/// ceiling-checked inserts for the same tenant serialize.
async fn lock_tenant(tx: &mut Transaction<'static, Postgres>, tenant_id: TenantId) -> RepositoryResult<()> {
    let row = sqlx::query("SELECT id FROM tenants WHERE id = $1 FOR UPDATE")
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_tenant", e))?;
    row.map(|_| ()).ok_or(RepositoryError::NotFound)
}

async fn insert_user(
    tx: &mut Transaction<'static, Postgres>,
    operation: &str,
    user: &UserAccount,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, role, tenant_id, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user.id.as_uuid())
    .bind(user.email.as_str())
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(user.tenant_id.map(Uuid::from))
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(operation, e))?;
    Ok(())
}

/// Fail with `LimitReached` when the tenant already has `max_users` active
/// users. Call only with the tenant row locked.
async fn check_user_ceiling(
    tx: &mut Transaction<'static, Postgres>,
    tenant_id: TenantId,
    max_users: u32,
) -> RepositoryResult<()> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM users WHERE tenant_id = $1 AND is_active")
        .bind(tenant_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("check_user_ceiling", e))?;
    let total: i64 = row
        .try_get("total")
        .map_err(|e| map_sqlx_error("check_user_ceiling", e))?;
    if total >= i64::from(max_users) {
        return Err(RepositoryError::LimitReached { resource: "users", limit: max_users });
    }
    Ok(())
}

fn expect_one(rows_affected: u64) -> RepositoryResult<()> {
    if rows_affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

const TENANT_COLUMNS: &str =
    "id, name, subdomain, status, subscription_plan, max_users, max_projects, created_at";
const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, tenant_id, is_active, created_at";
const PROJECT_COLUMNS: &str =
    "id, tenant_id, name, description, status, created_by, created_at, updated_at";
const TASK_COLUMNS: &str =
    "id, tenant_id, project_id, title, description, status, assignee_id, created_at, updated_at";

#[async_trait::async_trait]
impl TenantRepository for PostgresStore {
    async fn get_tenant(&self, id: TenantId) -> RepositoryResult<Option<Tenant>> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_tenant", e))?;
        row.map(|r| decode::<TenantRow, Tenant>(&r)).transpose()
    }

    async fn find_tenant_by_subdomain(&self, subdomain: &Subdomain) -> RepositoryResult<Option<Tenant>> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE subdomain = $1"))
            .bind(subdomain.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_subdomain", e))?;
        row.map(|r| decode::<TenantRow, Tenant>(&r)).transpose()
    }

    async fn list_tenants(&self) -> RepositoryResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenants", e))?;
        rows.iter().map(decode::<TenantRow, Tenant>).collect()
    }

    async fn rename_tenant(&self, id: TenantId, name: &str) -> RepositoryResult<Tenant> {
        let row = sqlx::query(&format!(
            "UPDATE tenants SET name = $2 WHERE id = $1 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("rename_tenant", e))?;
        decode_returned(row)
    }

    #[instrument(skip(self), fields(tenant_id = %id, status = %status), err)]
    async fn set_tenant_status(&self, id: TenantId, status: TenantStatus) -> RepositoryResult<Tenant> {
        let row = sqlx::query(&format!(
            "UPDATE tenants SET status = $2 WHERE id = $1 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_tenant_status", e))?;
        decode_returned(row)
    }

    #[instrument(skip(self), fields(tenant_id = %id, plan = %plan), err)]
    async fn set_tenant_plan(&self, id: TenantId, plan: SubscriptionPlan) -> RepositoryResult<Tenant> {
        let limits = plan.limits();
        let row = sqlx::query(&format!(
            r#"
            UPDATE tenants
            SET subscription_plan = $2, max_users = $3, max_projects = $4
            WHERE id = $1
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(plan.as_str())
        .bind(to_i32(limits.max_users))
        .bind(to_i32(limits.max_projects))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_tenant_plan", e))?;
        decode_returned(row)
    }
}

fn decode_returned(row: Option<PgRow>) -> RepositoryResult<Tenant> {
    let row = row.ok_or(RepositoryError::NotFound)?;
    decode::<TenantRow, Tenant>(&row)
}

#[async_trait::async_trait]
impl UserRepository for PostgresStore {
    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<UserAccount>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.map(|r| decode::<UserRow, UserAccount>(&r)).transpose()
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<UserAccount>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.map(|r| decode::<UserRow, UserAccount>(&r)).transpose()
    }

    async fn get_tenant_user(&self, tenant_id: TenantId, id: UserId) -> RepositoryResult<Option<UserAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_tenant_user", e))?;
        row.map(|r| decode::<UserRow, UserAccount>(&r)).transpose()
    }

    async fn list_tenant_users(&self, tenant_id: TenantId) -> RepositoryResult<Vec<UserAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY created_at, id"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tenant_users", e))?;
        rows.iter().map(decode::<UserRow, UserAccount>).collect()
    }

    #[instrument(skip(self, user), fields(tenant_id = %tenant_id, user_id = %user.id), err)]
    async fn create_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()> {
        if user.tenant_id != Some(tenant_id) {
            return Err(RepositoryError::NotFound);
        }
        let mut tx = self.begin().await?;
        lock_tenant(&mut tx, tenant_id).await?;

        check_user_ceiling(&mut tx, tenant_id, max_users).await?;

        insert_user(&mut tx, "create_tenant_user", user).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn update_tenant_user(&self, tenant_id: TenantId, user: &UserAccount) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET full_name = $3, role = $4, is_active = $5 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tenant_user", e))?;
        expect_one(result.rows_affected())
    }

    #[instrument(skip(self, user), fields(tenant_id = %tenant_id, user_id = %user.id), err)]
    async fn reactivate_tenant_user(
        &self,
        tenant_id: TenantId,
        user: &UserAccount,
        max_users: u32,
    ) -> RepositoryResult<()> {
        let mut tx = self.begin().await?;
        lock_tenant(&mut tx, tenant_id).await?;

        let row = sqlx::query("SELECT is_active FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(user.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("reactivate_tenant_user", e))?
            .ok_or(RepositoryError::NotFound)?;
        let was_active: bool = row
            .try_get("is_active")
            .map_err(|e| map_sqlx_error("reactivate_tenant_user", e))?;
        if !was_active {
            check_user_ceiling(&mut tx, tenant_id, max_users).await?;
        }

        sqlx::query(
            "UPDATE users SET full_name = $3, role = $4, is_active = TRUE WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("reactivate_tenant_user", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn create_super_admin(&self, user: &UserAccount) -> RepositoryResult<()> {
        let mut tx = self.begin().await?;
        insert_user(&mut tx, "create_super_admin", user).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait::async_trait]
impl RegistrationStore for PostgresStore {
    /// Both inserts share one transaction; the unique constraints re-validate
    /// subdomain and email at insert time, and any failure rolls back both.
    #[instrument(skip(self, tenant, admin), fields(tenant_id = %tenant.id, subdomain = %tenant.subdomain), err)]
    async fn create_tenant_with_admin(&self, tenant: &Tenant, admin: &UserAccount) -> RepositoryResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, subdomain, status, subscription_plan, max_users, max_projects, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.name)
        .bind(tenant.subdomain.as_str())
        .bind(tenant.status.as_str())
        .bind(tenant.subscription_plan.as_str())
        .bind(to_i32(tenant.max_users))
        .bind(to_i32(tenant.max_projects))
        .bind(tenant.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_tenant", e))?;

        insert_user(&mut tx, "insert_tenant_admin", admin).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait::async_trait]
impl ProjectRepository for PostgresStore {
    async fn list_projects(&self, tenant_id: TenantId) -> RepositoryResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE tenant_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_projects", e))?;
        rows.iter().map(decode::<ProjectRow, Project>).collect()
    }

    async fn get_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<Option<Project>> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_project", e))?;
        row.map(|r| decode::<ProjectRow, Project>(&r)).transpose()
    }

    #[instrument(skip(self, project), fields(tenant_id = %tenant_id, project_id = %project.id), err)]
    async fn create_project(
        &self,
        tenant_id: TenantId,
        project: &Project,
        max_projects: u32,
    ) -> RepositoryResult<()> {
        if project.tenant_id != tenant_id {
            return Err(RepositoryError::NotFound);
        }
        let mut tx = self.begin().await?;
        lock_tenant(&mut tx, tenant_id).await?;

        let row = sqlx::query("SELECT COUNT(*) AS total FROM projects WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_projects", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_projects", e))?;
        if total >= i64::from(max_projects) {
            return Err(RepositoryError::LimitReached { resource: "projects", limit: max_projects });
        }

        sqlx::query(
            r#"
            INSERT INTO projects (id, tenant_id, name, description, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(project.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(&project.name)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.created_by.as_uuid())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_project", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn update_project(&self, tenant_id: TenantId, project: &Project) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = $3, description = $4, status = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(project.id.as_uuid())
        .bind(&project.name)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_project", e))?;
        expect_one(result.rows_affected())
    }

    async fn delete_project(&self, tenant_id: TenantId, id: ProjectId) -> RepositoryResult<()> {
        // Tasks go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM projects WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_project", e))?;
        expect_one(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl TaskRepository for PostgresStore {
    async fn list_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> RepositoryResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = $1 AND project_id = $2 ORDER BY created_at, id"
        ))
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tasks", e))?;
        rows.iter().map(decode::<TaskRow, Task>).collect()
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = $1 AND id = $2"))
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_task", e))?;
        row.map(|r| decode::<TaskRow, Task>(&r)).transpose()
    }

    async fn create_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()> {
        if task.tenant_id != tenant_id {
            return Err(RepositoryError::NotFound);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (id, tenant_id, project_id, title, description, status, assignee_id, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE EXISTS (SELECT 1 FROM projects WHERE tenant_id = $2 AND id = $3)
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(task.project_id.as_uuid())
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.status.as_str())
        .bind(task.assignee.map(Uuid::from))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_task", e))?;
        expect_one(result.rows_affected())
    }

    async fn update_task(&self, tenant_id: TenantId, task: &Task) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = $3, description = $4, status = $5, assignee_id = $6, updated_at = $7
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(task.id.as_uuid())
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.status.as_str())
        .bind(task.assignee.map(Uuid::from))
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_task", e))?;
        expect_one(result.rows_affected())
    }

    async fn delete_task(&self, tenant_id: TenantId, id: TaskId) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_task", e))?;
        expect_one(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl AuditSink for PostgresStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, tenant_id, user_id, action, entity_type, entity_id, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id.map(Uuid::from))
        .bind(record.user_id.map(Uuid::from))
        .bind(record.action.as_str())
        .bind(&record.entity_type)
        .bind(record.entity_id.as_deref())
        .bind(record.ip_address.as_deref())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Map a SQLx error to a repository error.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            match db_err.constraint() {
                Some("tenants_subdomain_key") => return RepositoryError::DuplicateSubdomain,
                Some("users_email_key") => return RepositoryError::DuplicateEmail,
                _ => {}
            }
        }
        return RepositoryError::Storage(format!("database error in {operation}: {}", db_err.message()));
    }
    RepositoryError::Storage(format!("sqlx error in {operation}: {err}"))
}

fn decode<R, T>(row: &PgRow) -> RepositoryResult<T>
where
    R: for<'r> FromRow<'r, PgRow>,
    T: TryFrom<R, Error = RepositoryError>,
{
    let raw = R::from_row(row).map_err(|e| map_sqlx_error("decode_row", e))?;
    T::try_from(raw)
}

fn corrupt(what: &str, detail: impl core::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("corrupt {what} row: {detail}"))
}

// SQLx row types

#[derive(Debug)]
struct TenantRow {
    id: Uuid,
    name: String,
    subdomain: String,
    status: String,
    subscription_plan: String,
    max_users: i32,
    max_projects: i32,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TenantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TenantRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            subdomain: row.try_get("subdomain")?,
            status: row.try_get("status")?,
            subscription_plan: row.try_get("subscription_plan")?,
            max_users: row.try_get("max_users")?,
            max_projects: row.try_get("max_projects")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TenantRow> for Tenant {
    type Error = RepositoryError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant {
            id: TenantId::from_uuid(row.id),
            name: row.name,
            subdomain: Subdomain::parse(&row.subdomain).map_err(|e| corrupt("tenant", e))?,
            status: row.status.parse().map_err(|e| corrupt("tenant", e))?,
            subscription_plan: row.subscription_plan.parse().map_err(|e| corrupt("tenant", e))?,
            max_users: u32::try_from(row.max_users).map_err(|e| corrupt("tenant", e))?,
            max_projects: u32::try_from(row.max_projects).map_err(|e| corrupt("tenant", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
    tenant_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            role: row.try_get("role")?,
            tenant_id: row.try_get("tenant_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<UserRow> for UserAccount {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|e| corrupt("user", e))?;
        let tenant_id = row.tenant_id.map(TenantId::from_uuid);
        if role.is_global_scope() != tenant_id.is_none() {
            return Err(corrupt("user", "role and tenant disagree"));
        }
        Ok(UserAccount {
            id: UserId::from_uuid(row.id),
            email: Email::parse(&row.email).map_err(|e| corrupt("user", e))?,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            tenant_id,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct ProjectRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProjectRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProjectRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProjectRow> for Project {
    type Error = RepositoryError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: ProjectId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            description: row.description,
            status: row.status.parse().map_err(|e| corrupt("project", e))?,
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct TaskRow {
    id: Uuid,
    tenant_id: Uuid,
    project_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TaskRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TaskRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            project_id: row.try_get("project_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            assignee_id: row.try_get("assignee_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: TaskId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            project_id: ProjectId::from_uuid(row.project_id),
            title: row.title,
            description: row.description,
            status: row.status.parse().map_err(|e| corrupt("task", e))?,
            assignee: row.assignee_id.map(UserId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
