//! Service wiring: stores, token authority, password hashing and audit trail.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use keystone_auth::{CredentialVerifier, PasswordError, TokenAuthority, TokenError};
use keystone_infra::{
    AccountError, AccountService, AuditRecord, AuditRecorder, AuditSink, InMemoryAuditSink,
    InMemoryStore, PostgresStore, Repositories, RepositoryError,
};

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ServiceInitError {
    #[error("token authority: {0}")]
    Token(#[from] TokenError),

    #[error("password hashing: {0}")]
    Password(#[from] PasswordError),

    #[error("storage: {0}")]
    Storage(#[from] RepositoryError),

    #[error("super admin bootstrap: {0}")]
    Bootstrap(#[from] AccountError),

    #[error("DATABASE_URL is required for persistent stores")]
    MissingDatabaseUrl,
}

/// Shared services handed to every handler through an `Extension`.
pub struct AppServices {
    pub repos: Arc<dyn Repositories>,
    pub accounts: AccountService,
    pub tokens: Arc<TokenAuthority>,
    audit: AuditRecorder,
}

impl AppServices {
    /// Assemble services over the given stores.
    pub fn with_stores(
        repos: Arc<dyn Repositories>,
        audit_sink: Arc<dyn AuditSink>,
        config: &ApiConfig,
    ) -> Result<Self, ServiceInitError> {
        let tokens = Arc::new(TokenAuthority::hs256(config.jwt_secret.as_bytes())?);
        let passwords = CredentialVerifier::new(config.hashing)?;
        let audit = AuditRecorder::new(audit_sink);
        let accounts = AccountService::new(
            repos.clone(),
            passwords,
            tokens.clone(),
            config.token_ttl,
            audit.clone(),
        );
        Ok(Self {
            repos,
            accounts,
            tokens,
            audit,
        })
    }

    pub fn in_memory(config: &ApiConfig) -> Result<Self, ServiceInitError> {
        Self::with_stores(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryAuditSink::new()),
            config,
        )
    }

    /// Postgres when `USE_PERSISTENT_STORES` is set, otherwise in-memory.
    pub async fn from_config(config: &ApiConfig) -> Result<Self, ServiceInitError> {
        if !config.use_persistent_stores {
            info!("using in-memory stores");
            return Self::in_memory(config);
        }

        let url = config
            .database_url
            .as_deref()
            .ok_or(ServiceInitError::MissingDatabaseUrl)?;
        let store = Arc::new(PostgresStore::connect(url).await?);
        store.apply_schema().await?;
        info!("using postgres stores");
        Self::with_stores(store.clone(), store, config)
    }

    /// Create the configured super admin if it does not exist yet.
    pub async fn bootstrap(&self, config: &ApiConfig) -> Result<(), ServiceInitError> {
        if let Some(admin) = &config.super_admin {
            self.accounts
                .ensure_super_admin(&admin.email, &admin.password, &admin.full_name)
                .await?;
        }
        Ok(())
    }

    pub fn audit(&self, record: AuditRecord) {
        self.audit.record(record);
    }
}
