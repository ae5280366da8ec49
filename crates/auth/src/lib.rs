//! `keystone-auth`: authentication, authorization and tenant-isolation core.
//!
//! This crate is intentionally decoupled from HTTP and storage: every gate is a
//! plain function over values, and the few collaborators it needs (a clock, a
//! tenant status) are passed in by the caller.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod scope;
pub mod session;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use password::{CredentialVerifier, HashingCost, PasswordError};
pub use principal::{Principal, PrincipalError};
pub use roles::{Role, UnknownRole};
pub use scope::{ScopeError, TenantScope, bind_scope};
pub use session::{SessionError, extract_bearer, resolve_session};
pub use token::{IssuedToken, RejectReason, TokenAuthority, TokenError, TokenVerification, TokenVerifier};
pub use user::{Email, MIN_PASSWORD_LEN, UserAccount, validate_password};
