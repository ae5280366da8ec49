//! Append-only audit trail of security-relevant actions.
//!
//! Recording is fire-and-forget: [`AuditRecorder::record`] hands the write to
//! the runtime and returns immediately. A failed write is logged and dropped;
//! it never fails the request that triggered it.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use keystone_core::{TenantId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RegisterTenant,
    Login,
    LoginSuperAdmin,
    Logout,
    UpdateTenant,
    UpdateTenantPlan,
    UpdateTenantStatus,
    CreateProject,
    UpdateProject,
    DeleteProject,
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateUser,
    UpdateUser,
    DeactivateUser,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RegisterTenant => "REGISTER_TENANT",
            AuditAction::Login => "LOGIN",
            AuditAction::LoginSuperAdmin => "LOGIN_SUPER_ADMIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::UpdateTenant => "UPDATE_TENANT",
            AuditAction::UpdateTenantPlan => "UPDATE_TENANT_PLAN",
            AuditAction::UpdateTenantStatus => "UPDATE_TENANT_STATUS",
            AuditAction::CreateProject => "CREATE_PROJECT",
            AuditAction::UpdateProject => "UPDATE_PROJECT",
            AuditAction::DeleteProject => "DELETE_PROJECT",
            AuditAction::CreateTask => "CREATE_TASK",
            AuditAction::UpdateTask => "UPDATE_TASK",
            AuditAction::DeleteTask => "DELETE_TASK",
            AuditAction::CreateUser => "CREATE_USER",
            AuditAction::UpdateUser => "UPDATE_USER",
            AuditAction::DeactivateUser => "DEACTIVATE_USER",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, entity_type: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id: None,
            user_id: None,
            action,
            entity_type: entity_type.to_string(),
            entity_id: None,
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    pub fn tenant(mut self, tenant_id: Option<TenantId>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_id: impl ToString) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),
}

#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// In-memory audit sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.read() {
            Ok(r) => r.clone(),
            Err(_) => vec![],
        }
    }
}

#[async_trait::async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records
            .write()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl core::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Schedule `record` for appending and return immediately.
    pub fn record(&self, record: AuditRecord) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!(action = %record.action, "no async runtime; audit record dropped");
                return;
            }
        };

        let sink = self.sink.clone();
        handle.spawn(async move {
            let action = record.action;
            let tenant_id = record.tenant_id;
            if let Err(e) = sink.append(record).await {
                warn!(
                    action = %action,
                    tenant_id = ?tenant_id,
                    error = %e,
                    "failed to write audit record"
                );
            }
        });
    }
}

#[cfg(test)]
pub(crate) async fn wait_for_records(sink: &InMemoryAuditSink, n: usize) -> Vec<AuditRecord> {
    for _ in 0..100 {
        let records = sink.records();
        if records.len() >= n {
            return records;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    sink.records()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait::async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _record: AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn record_is_appended_asynchronously() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone());
        let tenant = TenantId::new();
        let user = UserId::new();

        recorder.record(
            AuditRecord::new(AuditAction::CreateProject, "project")
                .tenant(Some(tenant))
                .user(user)
                .entity("p-1")
                .ip(Some("10.0.0.1".into())),
        );

        let records = wait_for_records(&sink, 1).await;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.action.as_str(), "CREATE_PROJECT");
        assert_eq!(r.tenant_id, Some(tenant));
        assert_eq!(r.user_id, Some(user));
        assert_eq!(r.entity_id.as_deref(), Some("p-1"));
        assert_eq!(r.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let recorder = AuditRecorder::new(Arc::new(FailingSink));
        recorder.record(AuditRecord::new(AuditAction::Logout, "user"));
        tokio::task::yield_now().await;
    }

    #[test]
    fn recording_without_a_runtime_does_not_panic() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryAuditSink::new()));
        recorder.record(AuditRecord::new(AuditAction::Login, "user"));
    }

    #[test]
    fn actions_serialize_as_verb_tags() {
        assert_eq!(
            serde_json::to_string(&AuditAction::LoginSuperAdmin).unwrap(),
            "\"LOGIN_SUPER_ADMIN\""
        );
    }
}
