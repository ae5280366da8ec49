//! Tenant self-registration, login and super-admin bootstrap.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use keystone_auth::{
    CredentialVerifier, Email, IssuedToken, PasswordError, Role, TokenAuthority, TokenError,
    UserAccount, validate_password,
};
use keystone_core::{DomainError, Subdomain, Tenant};

use crate::audit::{AuditAction, AuditRecord, AuditRecorder};
use crate::repository::{Repositories, RepositoryError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("subdomain already registered")]
    DuplicateSubdomain,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("tenant is suspended")]
    TenantSuspended,

    /// Unknown email, wrong password, wrong tenant or deactivated account.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AccountError {
    fn from(e: DomainError) -> Self {
        if e.is_caller_fault() {
            AccountError::Validation(e.to_string())
        } else {
            AccountError::Internal(e.to_string())
        }
    }
}

impl From<RepositoryError> for AccountError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::DuplicateSubdomain => AccountError::DuplicateSubdomain,
            RepositoryError::DuplicateEmail => AccountError::DuplicateEmail,
            other => AccountError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AccountError {
    fn from(e: PasswordError) -> Self {
        AccountError::Internal(e.to_string())
    }
}

impl From<TokenError> for AccountError {
    fn from(e: TokenError) -> Self {
        AccountError::Internal(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TenantRegistration {
    pub tenant_name: String,
    pub subdomain: String,
    pub admin_email: String,
    pub admin_full_name: String,
    pub admin_password: String,
}

#[derive(Debug, Clone)]
pub struct RegisteredTenant {
    pub tenant: Tenant,
    pub admin: UserAccount,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Absent for the super-admin login path.
    pub tenant_subdomain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserAccount,
    pub tenant: Option<Tenant>,
    pub token: IssuedToken,
}

pub struct AccountService {
    repos: Arc<dyn Repositories>,
    passwords: CredentialVerifier,
    tokens: Arc<TokenAuthority>,
    token_ttl: Duration,
    audit: AuditRecorder,
}

impl AccountService {
    pub fn new(
        repos: Arc<dyn Repositories>,
        passwords: CredentialVerifier,
        tokens: Arc<TokenAuthority>,
        token_ttl: Duration,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            repos,
            passwords,
            tokens,
            token_ttl,
            audit,
        }
    }

    /// Hash on the blocking pool; Argon2 is deliberately slow.
    pub async fn hash_password(&self, plaintext: &str) -> Result<String, AccountError> {
        let passwords = self.passwords.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || passwords.hash(&plaintext))
            .await
            .map_err(|e| AccountError::Internal(format!("hashing task failed: {e}")))?
            .map_err(AccountError::from)
    }

    /// Verify against `digest`, or against a dummy digest when there is no
    /// candidate account so both paths cost the same.
    async fn verify_password(&self, plaintext: &str, digest: Option<&str>) -> Result<bool, AccountError> {
        let passwords = self.passwords.clone();
        let plaintext = plaintext.to_string();
        let digest = digest.map(str::to_string);
        tokio::task::spawn_blocking(move || match digest {
            Some(d) => passwords.verify(&plaintext, &d),
            None => {
                passwords.verify_against_dummy(&plaintext);
                Ok(false)
            }
        })
        .await
        .map_err(|e| AccountError::Internal(format!("verification task failed: {e}")))?
        .map_err(AccountError::from)
    }

    pub async fn register_tenant(
        &self,
        input: TenantRegistration,
        ip_address: Option<String>,
    ) -> Result<RegisteredTenant, AccountError> {
        let now = Utc::now();
        let subdomain = Subdomain::parse(&input.subdomain)?;
        let email = Email::parse(&input.admin_email)?;
        validate_password(&input.admin_password)?;
        let tenant = Tenant::register(&input.tenant_name, subdomain, now)?;

        // Fast path for the common conflict; the store re-checks atomically.
        if self.repos.find_tenant_by_subdomain(&tenant.subdomain).await?.is_some() {
            return Err(AccountError::DuplicateSubdomain);
        }
        if self.repos.find_user_by_email(&email).await?.is_some() {
            return Err(AccountError::DuplicateEmail);
        }

        let digest = self.hash_password(&input.admin_password).await?;
        let admin = UserAccount::new(
            email,
            digest,
            &input.admin_full_name,
            Role::TenantAdmin,
            Some(tenant.id),
            now,
        )?;

        self.repos.create_tenant_with_admin(&tenant, &admin).await?;

        info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "tenant registered");
        self.audit.record(
            AuditRecord::new(AuditAction::RegisterTenant, "tenant")
                .tenant(Some(tenant.id))
                .user(admin.id)
                .entity(tenant.id)
                .ip(ip_address),
        );

        Ok(RegisteredTenant { tenant, admin })
    }

    pub async fn login(
        &self,
        input: LoginRequest,
        ip_address: Option<String>,
    ) -> Result<LoginOutcome, AccountError> {
        let tenant = match input.tenant_subdomain.as_deref() {
            None => None,
            Some(raw) => {
                let subdomain = Subdomain::parse(raw).map_err(|_| AccountError::TenantNotFound)?;
                let tenant = self
                    .repos
                    .find_tenant_by_subdomain(&subdomain)
                    .await?
                    .ok_or(AccountError::TenantNotFound)?;
                if !tenant.is_active() {
                    return Err(AccountError::TenantSuspended);
                }
                Some(tenant)
            }
        };

        // A malformed email simply has no candidate account.
        let candidate = match Email::parse(&input.email) {
            Ok(email) => self.repos.find_user_by_email(&email).await?,
            Err(_) => None,
        };
        let expected_tenant = tenant.as_ref().map(|t| t.id);
        let candidate = candidate.filter(|u| u.tenant_id == expected_tenant);

        let matched = self
            .verify_password(&input.password, candidate.as_ref().map(|u| u.password_hash.as_str()))
            .await?;

        let user = match candidate {
            Some(u) if matched && u.is_active => u,
            Some(u) => {
                warn!(user_id = %u.id, active = u.is_active, "login rejected");
                return Err(AccountError::InvalidCredentials);
            }
            None => {
                warn!("login rejected for unknown account");
                return Err(AccountError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(user.id, user.tenant_id, user.role, self.token_ttl)?;

        let action = if user.role.is_global_scope() {
            AuditAction::LoginSuperAdmin
        } else {
            AuditAction::Login
        };
        self.audit.record(
            AuditRecord::new(action, "user")
                .tenant(user.tenant_id)
                .user(user.id)
                .entity(user.id)
                .ip(ip_address),
        );

        Ok(LoginOutcome { user, tenant, token })
    }

    /// Create the super admin unless an account with that email already exists.
    pub async fn ensure_super_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<UserAccount, AccountError> {
        let email = Email::parse(email)?;
        if let Some(existing) = self.repos.find_user_by_email(&email).await? {
            if existing.role != Role::SuperAdmin {
                return Err(AccountError::DuplicateEmail);
            }
            return Ok(existing);
        }

        validate_password(password)?;
        let digest = self.hash_password(password).await?;
        let admin = UserAccount::new(email, digest, full_name, Role::SuperAdmin, None, Utc::now())?;
        self.repos.create_super_admin(&admin).await?;
        info!(user_id = %admin.id, "super admin bootstrapped");
        Ok(admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{InMemoryAuditSink, wait_for_records};
    use crate::in_memory::InMemoryStore;
    use crate::repository::{TenantRepository, UserRepository};
    use keystone_auth::{HashingCost, TokenVerifier};
    use keystone_core::TenantStatus;

    struct Harness {
        service: AccountService,
        store: Arc<InMemoryStore>,
        audit: Arc<InMemoryAuditSink>,
        tokens: Arc<TokenAuthority>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let tokens = Arc::new(TokenAuthority::hs256(b"accounts-test").unwrap());
        let passwords = CredentialVerifier::new(HashingCost {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let service = AccountService::new(
            store.clone(),
            passwords,
            tokens.clone(),
            Duration::minutes(15),
            AuditRecorder::new(audit.clone()),
        );
        Harness { service, store, audit, tokens }
    }

    fn registration(sub: &str, email: &str) -> TenantRegistration {
        TenantRegistration {
            tenant_name: "Acme Inc".into(),
            subdomain: sub.into(),
            admin_email: email.into(),
            admin_full_name: "Ada Admin".into(),
            admin_password: "s3cret!".into(),
        }
    }

    fn login(email: &str, password: &str, sub: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
            tenant_subdomain: sub.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn registration_creates_active_free_tenant_and_admin() {
        let h = harness();
        let out = h
            .service
            .register_tenant(registration("acme", "Admin@Acme.com"), Some("1.2.3.4".into()))
            .await
            .unwrap();

        assert_eq!(out.tenant.status, TenantStatus::Active);
        assert_eq!((out.tenant.max_users, out.tenant.max_projects), (5, 3));
        assert_eq!(out.admin.role, Role::TenantAdmin);
        assert_eq!(out.admin.tenant_id, Some(out.tenant.id));
        assert_eq!(out.admin.email.as_str(), "admin@acme.com");
        assert_ne!(out.admin.password_hash, "s3cret!");

        let records = wait_for_records(&h.audit, 1).await;
        assert_eq!(records[0].action, AuditAction::RegisterTenant);
        assert_eq!(records[0].ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn second_registration_with_same_subdomain_is_rejected_without_rows() {
        let h = harness();
        h.service.register_tenant(registration("acme", "a@acme.com"), None).await.unwrap();

        let err = h
            .service
            .register_tenant(registration("acme", "b@acme.com"), None)
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::DuplicateSubdomain);
        let b = Email::parse("b@acme.com").unwrap();
        assert!(h.store.find_user_by_email(&b).await.unwrap().is_none());
        assert_eq!(h.store.list_tenants().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registration_validates_input() {
        let h = harness();
        let mut short = registration("acme", "a@acme.com");
        short.admin_password = "12345".into();
        let mut bad_email = registration("acme", "no-at-sign");
        bad_email.admin_email = "no-at-sign".into();
        let mut blank_name = registration("acme", "a@acme.com");
        blank_name.admin_full_name = "  ".into();
        let bad_sub = registration("Not A Subdomain!", "a@acme.com");

        for input in [short, bad_email, blank_name, bad_sub] {
            assert!(matches!(
                h.service.register_tenant(input, None).await,
                Err(AccountError::Validation(_))
            ));
        }
        assert!(h.store.list_tenants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tenant_login_issues_a_tenant_scoped_token() {
        let h = harness();
        let reg = h.service.register_tenant(registration("acme", "a@acme.com"), None).await.unwrap();

        let out = h.service.login(login("a@acme.com", "s3cret!", Some("acme")), None).await.unwrap();
        let claims = h.tokens.verify(&out.token.token, Utc::now()).into_result().unwrap();
        assert_eq!(claims.sub, reg.admin.id);
        assert_eq!(claims.tenant_id, Some(reg.tenant.id));
        assert_eq!(claims.role, Role::TenantAdmin);

        let records = wait_for_records(&h.audit, 2).await;
        assert_eq!(records[1].action, AuditAction::Login);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness();
        let reg = h.service.register_tenant(registration("acme", "a@acme.com"), None).await.unwrap();
        h.service.register_tenant(registration("beta", "b@beta.com"), None).await.unwrap();

        let wrong_password = h.service.login(login("a@acme.com", "nope!!", Some("acme")), None).await;
        let unknown_email = h.service.login(login("x@acme.com", "s3cret!", Some("acme")), None).await;
        let wrong_tenant = h.service.login(login("a@acme.com", "s3cret!", Some("beta")), None).await;
        let no_tenant = h.service.login(login("a@acme.com", "s3cret!", None), None).await;

        let mut admin = reg.admin.clone();
        admin.set_active(false);
        h.store.update_tenant_user(reg.tenant.id, &admin).await.unwrap();
        let deactivated = h.service.login(login("a@acme.com", "s3cret!", Some("acme")), None).await;

        for result in [wrong_password, unknown_email, wrong_tenant, no_tenant, deactivated] {
            assert_eq!(result.unwrap_err(), AccountError::InvalidCredentials);
        }
    }

    #[tokio::test]
    async fn rejected_attempts_leave_no_audit_trail() {
        let h = harness();
        h.service.register_tenant(registration("acme", "a@acme.com"), None).await.unwrap();
        let beta = h.service.register_tenant(registration("beta", "b@beta.com"), None).await.unwrap();
        assert_eq!(wait_for_records(&h.audit, 2).await.len(), 2);

        assert!(h.service.login(login("a@acme.com", "nope!!", Some("acme")), None).await.is_err());
        assert_eq!(
            h.service
                .register_tenant(registration("acme", "c@acme.com"), None)
                .await
                .unwrap_err(),
            AccountError::DuplicateSubdomain
        );
        let mut parked = beta.admin.clone();
        parked.set_active(false);
        h.store.update_tenant_user(beta.tenant.id, &parked).await.unwrap();
        assert!(h.service.login(login("b@beta.com", "s3cret!", Some("beta")), None).await.is_err());

        // A later success flushes anything queued before it.
        h.service.login(login("a@acme.com", "s3cret!", Some("acme")), None).await.unwrap();
        let records = wait_for_records(&h.audit, 3).await;
        let actions: Vec<_> = records.iter().map(|r| r.action).collect();
        assert_eq!(actions.len(), 3, "{actions:?}");
        assert_eq!(actions.iter().filter(|a| **a == AuditAction::RegisterTenant).count(), 2);
        assert_eq!(actions.iter().filter(|a| **a == AuditAction::Login).count(), 1);
    }

    #[tokio::test]
    async fn login_checks_the_tenant_before_credentials() {
        let h = harness();
        let reg = h.service.register_tenant(registration("acme", "a@acme.com"), None).await.unwrap();

        assert_eq!(
            h.service.login(login("a@acme.com", "s3cret!", Some("ghost")), None).await.unwrap_err(),
            AccountError::TenantNotFound
        );

        h.store
            .set_tenant_status(reg.tenant.id, TenantStatus::Suspended)
            .await
            .unwrap();
        assert_eq!(
            h.service.login(login("a@acme.com", "s3cret!", Some("acme")), None).await.unwrap_err(),
            AccountError::TenantSuspended
        );
    }

    #[tokio::test]
    async fn super_admin_bootstrap_is_idempotent_and_logs_in_globally() {
        let h = harness();
        let first = h.service.ensure_super_admin("root@keystone.dev", "rootpass", "Root").await.unwrap();
        let second = h.service.ensure_super_admin("root@keystone.dev", "rootpass", "Root").await.unwrap();
        assert_eq!(first.id, second.id);

        let out = h.service.login(login("root@keystone.dev", "rootpass", None), None).await.unwrap();
        assert_eq!(out.token.claims.tenant_id, None);
        assert_eq!(out.token.claims.role, Role::SuperAdmin);
        assert!(out.tenant.is_none());

        let records = wait_for_records(&h.audit, 1).await;
        assert_eq!(records[0].action, AuditAction::LoginSuperAdmin);
    }
}
