//! User accounts: credential holders scoped to at most one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult, TenantId, UserId};

use crate::{Principal, Role};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

const MAX_EMAIL_LEN: usize = 254;

/// Normalized (trimmed, lowercase) email address. Globally unique per account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim().to_lowercase();
        let valid = value.len() <= MAX_EMAIL_LEN
            && !value.chars().any(char::is_whitespace)
            && matches!(value.split_once('@'), Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
        if !valid {
            return Err(DomainError::validation("a valid email address is required"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_password(plaintext: &str) -> DomainResult<()> {
    if plaintext.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// A stored user account.
///
/// # Invariants
/// - `role = super_admin` ⇔ `tenant_id = None`.
/// - `tenant_id` never changes after creation.
/// - Accounts are never physically deleted; `is_active = false` is terminal
///   for authentication purposes.
#[derive(Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Email,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl core::fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("tenant_id", &self.tenant_id)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl UserAccount {
    pub fn new(
        email: Email,
        password_hash: String,
        full_name: &str,
        role: Role,
        tenant_id: Option<TenantId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if role.is_global_scope() != tenant_id.is_none() {
            return Err(DomainError::scope_mismatch(format!(
                "role '{role}' is inconsistent with tenant assignment"
            )));
        }
        Ok(Self {
            id: UserId::new(),
            email,
            password_hash,
            full_name: validate_full_name(full_name)?,
            role,
            tenant_id,
            is_active: true,
            created_at: now,
        })
    }

    /// The principal this account acts as once authenticated.
    pub fn principal(&self) -> DomainResult<Principal> {
        Principal::new(self.id, self.tenant_id, self.role)
            .map_err(|e| DomainError::scope_mismatch(e.to_string()))
    }

    pub fn rename(&mut self, full_name: &str) -> DomainResult<()> {
        self.full_name = validate_full_name(full_name)?;
        Ok(())
    }

    /// Change the role of a tenant-scoped account. Tenant accounts can never be
    /// promoted to a global role.
    pub fn change_role(&mut self, role: Role) -> DomainResult<()> {
        if role.is_global_scope() != self.role.is_global_scope() {
            return Err(DomainError::validation(format!(
                "cannot change role from '{}' to '{role}'",
                self.role
            )));
        }
        self.role = role;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

fn validate_full_name(full_name: &str) -> DomainResult<String> {
    let name = full_name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("full name is required"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(email("  A@Acme.COM ").as_str(), "a@acme.com");
    }

    #[test]
    fn email_requires_local_and_domain() {
        for bad in ["", "acme.com", "@acme.com", "a@", "a b@acme.com", "a@b@c"] {
            assert!(Email::parse(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn password_length_is_enforced() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn tenant_role_requires_tenant_and_super_admin_forbids_one() {
        let now = Utc::now();
        assert!(UserAccount::new(email("a@x.io"), "h".into(), "A", Role::User, None, now).is_err());
        assert!(
            UserAccount::new(email("a@x.io"), "h".into(), "A", Role::SuperAdmin, Some(TenantId::new()), now)
                .is_err()
        );
        let u = UserAccount::new(email("a@x.io"), "h".into(), "A", Role::SuperAdmin, None, now).unwrap();
        assert!(u.is_active);
        assert!(u.principal().unwrap().is_global_scope());
    }

    #[test]
    fn tenant_accounts_cannot_be_promoted_to_super_admin() {
        let mut u = UserAccount::new(
            email("u@x.io"),
            "h".into(),
            "U",
            Role::User,
            Some(TenantId::new()),
            Utc::now(),
        )
        .unwrap();
        assert!(u.change_role(Role::SuperAdmin).is_err());
        u.change_role(Role::TenantAdmin).unwrap();
        assert_eq!(u.role, Role::TenantAdmin);
    }

    #[test]
    fn debug_output_hides_the_password_hash() {
        let u = UserAccount::new(
            email("u@x.io"),
            "$argon2id$secret".into(),
            "U",
            Role::User,
            Some(TenantId::new()),
            Utc::now(),
        )
        .unwrap();
        assert!(!format!("{u:?}").contains("argon2id"));
    }
}
