use thiserror::Error;

use keystone_core::{TenantId, UserId};

use crate::claims::TokenClaims;
use crate::Role;

/// The authenticated actor for one request.
///
/// Built fresh per request from verified token claims and never persisted.
/// Fields are private so the role/tenant invariant cannot be bypassed:
/// a super admin never has a tenant, every other role always has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject_id: UserId,
    tenant_id: Option<TenantId>,
    role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("a globally scoped principal cannot be bound to a tenant")]
    GlobalRoleWithTenant,

    #[error("role '{0}' requires a tenant")]
    MissingTenant(Role),
}

impl Principal {
    pub fn new(subject_id: UserId, tenant_id: Option<TenantId>, role: Role) -> Result<Self, PrincipalError> {
        match (role.is_global_scope(), tenant_id) {
            (true, Some(_)) => Err(PrincipalError::GlobalRoleWithTenant),
            (false, None) => Err(PrincipalError::MissingTenant(role)),
            _ => Ok(Self {
                subject_id,
                tenant_id,
                role,
            }),
        }
    }

    pub fn super_admin(subject_id: UserId) -> Self {
        Self {
            subject_id,
            tenant_id: None,
            role: Role::SuperAdmin,
        }
    }

    pub fn tenant_member(subject_id: UserId, tenant_id: TenantId, role: Role) -> Result<Self, PrincipalError> {
        Self::new(subject_id, Some(tenant_id), role)
    }

    pub fn from_claims(claims: &TokenClaims) -> Result<Self, PrincipalError> {
        Self::new(claims.sub, claims.tenant_id, claims.role)
    }

    pub fn subject_id(&self) -> UserId {
        self.subject_id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_global_scope(&self) -> bool {
        self.role.is_global_scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_has_no_tenant() {
        let p = Principal::super_admin(UserId::new());
        assert!(p.is_global_scope());
        assert_eq!(p.tenant_id(), None);
    }

    #[test]
    fn invariant_is_enforced_both_ways() {
        let uid = UserId::new();
        assert_eq!(
            Principal::new(uid, Some(TenantId::new()), Role::SuperAdmin),
            Err(PrincipalError::GlobalRoleWithTenant)
        );
        assert_eq!(
            Principal::new(uid, None, Role::TenantAdmin),
            Err(PrincipalError::MissingTenant(Role::TenantAdmin))
        );
        assert_eq!(
            Principal::tenant_member(uid, TenantId::new(), Role::SuperAdmin),
            Err(PrincipalError::GlobalRoleWithTenant)
        );
    }
}
