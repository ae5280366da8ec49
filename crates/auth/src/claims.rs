use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keystone_core::{TenantId, UserId};

use crate::Role;

/// Identity token claims (transport-agnostic).
///
/// Immutable once issued. The signature covering these claims is produced and
/// checked by [`crate::token::TokenAuthority`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Tenant the subject is bound to; `None` only for a super admin.
    pub tenant_id: Option<TenantId>,

    pub role: Role,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// The role/tenant pairing every principal must satisfy.
    pub fn has_consistent_scope(&self) -> bool {
        self.role.is_global_scope() == self.tenant_id.is_none()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of claims at `now`.
///
/// Note: this validates the *claims* only. Signature verification happens
/// before claims are ever parsed.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(),
            tenant_id: Some(TenantId::new()),
            role: Role::User,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let c = claims(now, Duration::minutes(5));
        assert_eq!(validate_claims(&c, c.expires_at), Err(TokenValidationError::Expired));
        assert_eq!(validate_claims(&c, c.expires_at - Duration::nanoseconds(1)), Ok(()));
    }

    #[test]
    fn empty_window_is_rejected() {
        let now = Utc::now();
        let c = claims(now, Duration::zero());
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn scope_consistency_follows_role() {
        let now = Utc::now();
        let mut c = claims(now, Duration::minutes(1));
        assert!(c.has_consistent_scope());
        c.role = Role::SuperAdmin;
        assert!(!c.has_consistent_scope());
        c.tenant_id = None;
        assert!(c.has_consistent_scope());
        c.role = Role::TenantAdmin;
        assert!(!c.has_consistent_scope());
    }
}
