//! Session resolver: raw `Authorization` header → [`Principal`].
//!
//! Purely token-based; no persistence read happens here.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::token::{RejectReason, TokenVerifier};
use crate::Principal;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("authentication rejected: {reason}")]
pub struct SessionError {
    pub reason: RejectReason,
}

impl From<RejectReason> for SessionError {
    fn from(reason: RejectReason) -> Self {
        Self { reason }
    }
}

/// Extract the token from a `Bearer` authorization header value.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

pub fn resolve_session(
    verifier: &dyn TokenVerifier,
    authorization: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Principal, SessionError> {
    let token = extract_bearer(authorization).ok_or(RejectReason::MissingToken)?;

    let claims = verifier.verify(token, now).into_result().map_err(|reason| {
        debug!(reason = %reason, "token rejected");
        reason
    })?;

    // Claims were already checked for scope consistency; this cannot fail for
    // a token the verifier accepted, but a principal is only ever built here.
    Principal::from_claims(&claims).map_err(|e| {
        debug!(error = %e, "claims do not form a valid principal");
        SessionError::from(RejectReason::MalformedToken)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenAuthority;
    use crate::Role;
    use chrono::Duration;
    use keystone_core::{TenantId, UserId};

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Bearer   abc  ")), Some("abc"));
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(Some("bearer abc")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn valid_token_resolves_to_principal() {
        let auth = TokenAuthority::hs256(b"session-secret").unwrap();
        let sub = UserId::new();
        let tenant = TenantId::new();
        let issued = auth.issue(sub, Some(tenant), Role::User, Duration::minutes(5)).unwrap();

        let header = format!("Bearer {}", issued.token);
        let p = resolve_session(&auth, Some(&header), Utc::now()).unwrap();
        assert_eq!(p.subject_id(), sub);
        assert_eq!(p.tenant_id(), Some(tenant));
        assert_eq!(p.role(), Role::User);
    }

    #[test]
    fn missing_and_invalid_tokens_are_rejected_with_distinct_reasons() {
        let auth = TokenAuthority::hs256(b"session-secret").unwrap();
        let now = Utc::now();

        assert_eq!(
            resolve_session(&auth, None, now).unwrap_err().reason,
            RejectReason::MissingToken
        );
        assert_eq!(
            resolve_session(&auth, Some("Bearer nope"), now).unwrap_err().reason,
            RejectReason::MalformedToken
        );

        let issued = auth
            .issue_at(UserId::new(), None, Role::SuperAdmin, Duration::seconds(1), now)
            .unwrap();
        let header = format!("Bearer {}", issued.token);
        assert_eq!(
            resolve_session(&auth, Some(&header), now + Duration::seconds(1)).unwrap_err().reason,
            RejectReason::Expired
        );
    }
}
