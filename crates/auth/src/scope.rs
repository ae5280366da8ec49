//! Tenant isolation gate.
//!
//! The effective tenant of a request is always derived from the verified
//! principal, never from anything the client put in the request. Downstream
//! data access receives the resulting [`TenantScope`] and filters on it.

use thiserror::Error;
use tracing::warn;

use keystone_core::{TenantId, TenantStatus};

use crate::Principal;

/// The tenant partition a request is permitted to read and write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TenantScope {
    /// Unrestricted; only ever produced for a globally scoped principal.
    Global,
    Tenant(TenantId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("tenant {0} not found")]
    TenantNotFound(TenantId),

    #[error("tenant {0} is not active")]
    TenantSuspended(TenantId),
}

impl TenantScope {
    /// Resolve the scope for `principal`.
    ///
    /// `requested` is whatever tenant identifier the client supplied. It is
    /// ignored for scoping; a mismatch is only logged.
    pub fn for_principal(principal: &Principal, requested: Option<TenantId>) -> Self {
        match principal.tenant_id() {
            None => TenantScope::Global,
            Some(own) => {
                if let Some(requested) = requested.filter(|r| *r != own) {
                    warn!(
                        principal = %principal.subject_id(),
                        tenant_id = %own,
                        requested_tenant_id = %requested,
                        "ignoring client-supplied tenant id outside principal scope"
                    );
                }
                TenantScope::Tenant(own)
            }
        }
    }

    /// Re-validate that the scoped tenant is still usable.
    ///
    /// `status` is the current status of the scoped tenant (`None` when it no
    /// longer exists). A global scope passes through untouched.
    pub fn require_active(self, status: Option<TenantStatus>) -> Result<Self, ScopeError> {
        match self {
            TenantScope::Global => Ok(self),
            TenantScope::Tenant(id) => match status {
                None => Err(ScopeError::TenantNotFound(id)),
                Some(TenantStatus::Active) => Ok(self),
                Some(TenantStatus::Suspended) => Err(ScopeError::TenantSuspended(id)),
            },
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            TenantScope::Global => None,
            TenantScope::Tenant(id) => Some(*id),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, TenantScope::Global)
    }
}

/// Resolve and validate a scope in one step when tenant status is at hand.
pub fn bind_scope<F>(
    principal: &Principal,
    requested: Option<TenantId>,
    tenant_status: F,
) -> Result<TenantScope, ScopeError>
where
    F: FnOnce(TenantId) -> Option<TenantStatus>,
{
    let scope = TenantScope::for_principal(principal, requested);
    let status = scope.tenant_id().and_then(tenant_status);
    scope.require_active(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use keystone_core::UserId;
    use proptest::prelude::*;

    fn member(tenant: TenantId, role: Role) -> Principal {
        Principal::tenant_member(UserId::new(), tenant, role).unwrap()
    }

    #[test]
    fn super_admin_is_global_and_skips_status() {
        let p = Principal::super_admin(UserId::new());
        let scope = bind_scope(&p, Some(TenantId::new()), |_| None).unwrap();
        assert_eq!(scope, TenantScope::Global);
        assert!(scope.is_global());
    }

    #[test]
    fn suspended_tenant_is_denied() {
        let tenant = TenantId::new();
        let p = member(tenant, Role::User);
        assert_eq!(
            bind_scope(&p, None, |_| Some(TenantStatus::Suspended)),
            Err(ScopeError::TenantSuspended(tenant))
        );
    }

    #[test]
    fn vanished_tenant_is_not_found() {
        let tenant = TenantId::new();
        let p = member(tenant, Role::TenantAdmin);
        assert_eq!(bind_scope(&p, None, |_| None), Err(ScopeError::TenantNotFound(tenant)));
    }

    #[test]
    fn status_lookup_is_asked_about_the_principal_tenant() {
        let own = TenantId::new();
        let other = TenantId::new();
        let p = member(own, Role::TenantAdmin);
        let mut asked = None;
        let scope = bind_scope(&p, Some(other), |t| {
            asked = Some(t);
            Some(TenantStatus::Active)
        })
        .unwrap();
        assert_eq!(asked, Some(own));
        assert_eq!(scope.tenant_id(), Some(own));
    }

    proptest! {
        #[test]
        fn tenant_principals_are_always_scoped_to_their_own_tenant(
            own in any::<u128>(),
            requested in proptest::option::of(any::<u128>()),
            admin in any::<bool>(),
        ) {
            let own = TenantId::from_uuid(uuid::Uuid::from_u128(own));
            let requested = requested.map(|r| TenantId::from_uuid(uuid::Uuid::from_u128(r)));
            let role = if admin { Role::TenantAdmin } else { Role::User };
            let p = member(own, role);

            prop_assert_eq!(TenantScope::for_principal(&p, requested), TenantScope::Tenant(own));
            prop_assert_eq!(
                bind_scope(&p, requested, |_| Some(TenantStatus::Active)),
                Ok(TenantScope::Tenant(own))
            );
        }
    }
}
