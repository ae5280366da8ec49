use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{actual}' is not one of the allowed roles")]
    InsufficientRole { actual: Role },
}

/// Role authorization gate.
///
/// Allows iff the principal's role is a member of `allowed`. There is no
/// implicit super-admin bypass here: endpoints that admit a super admin list
/// it explicitly.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&principal.role()) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            actual: principal.role(),
        })
    }
}
