//! Signed identity tokens (HS256 JWT compact form).
//!
//! Signature verification always happens before any claim is parsed: a token
//! whose bytes were altered is reported as [`RejectReason::BadSignature`] and
//! never yields a claim set.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use keystone_core::{TenantId, UserId};

use crate::claims::{TokenClaims, TokenValidationError, validate_claims};
use crate::Role;

/// Why a presented credential was not accepted.
///
/// Every variant is reported to the network caller as the same generic
/// "invalid credentials" response; the distinction only reaches server logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RejectReason {
    MissingToken,
    MalformedToken,
    BadSignature,
    Expired,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingToken => "missing_token",
            RejectReason::MalformedToken => "malformed_token",
            RejectReason::BadSignature => "bad_signature",
            RejectReason::Expired => "expired",
        }
    }
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Accepted { claims: TokenClaims },
    Rejected { reason: RejectReason },
}

impl TokenVerification {
    fn rejected(reason: RejectReason) -> Self {
        TokenVerification::Rejected { reason }
    }

    pub fn into_result(self) -> Result<TokenClaims, RejectReason> {
        match self {
            TokenVerification::Accepted { claims } => Ok(claims),
            TokenVerification::Rejected { reason } => Err(reason),
        }
    }
}

/// Verification side of the token authority, as consumed by the session resolver.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> TokenVerification;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token ttl must be positive")]
    NonPositiveTtl,

    #[error("token ttl puts the expiry out of range")]
    TtlOutOfRange,

    #[error("role '{0}' is inconsistent with the presence of a tenant")]
    InconsistentScope(Role),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A freshly minted token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Issues and verifies identity tokens with a process-wide HMAC secret.
///
/// The secret is injected once at construction and never changes afterwards,
/// so the authority can be shared freely behind an `Arc`.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    header: Header,
    validation: Validation,
}

impl core::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("algorithm", &self.header.alg)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn hs256(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Time-window checks run against an injected clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            header: Header::new(Algorithm::HS256),
            validation,
        })
    }

    pub fn issue(
        &self,
        sub: UserId,
        tenant_id: Option<TenantId>,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(sub, tenant_id, role, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        sub: UserId,
        tenant_id: Option<TenantId>,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::NonPositiveTtl);
        }

        let expires_at = now.checked_add_signed(ttl).ok_or(TokenError::TtlOutOfRange)?;
        let claims = TokenClaims {
            sub,
            tenant_id,
            role,
            issued_at: now,
            expires_at,
        };
        if !claims.has_consistent_scope() {
            return Err(TokenError::InconsistentScope(role));
        }

        let token = jsonwebtoken::encode(&self.header, &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    fn check_signature(&self, token: &str) -> Result<(), RejectReason> {
        let (message, signature) = token
            .rsplit_once('.')
            .ok_or(RejectReason::MalformedToken)?;
        if signature.is_empty() || message.split('.').count() != 2 {
            return Err(RejectReason::MalformedToken);
        }

        // Re-signs the message and compares in constant time.
        match jsonwebtoken::crypto::verify(signature, message.as_bytes(), &self.decoding, Algorithm::HS256) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RejectReason::BadSignature),
            Err(_) => Err(RejectReason::MalformedToken),
        }
    }
}

impl TokenVerifier for TokenAuthority {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> TokenVerification {
        if let Err(reason) = self.check_signature(token) {
            return TokenVerification::rejected(reason);
        }

        let claims = match jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => RejectReason::BadSignature,
                    _ => RejectReason::MalformedToken,
                };
                return TokenVerification::rejected(reason);
            }
        };

        if !claims.has_consistent_scope() {
            return TokenVerification::rejected(RejectReason::MalformedToken);
        }

        match validate_claims(&claims, now) {
            Ok(()) => TokenVerification::Accepted { claims },
            Err(TokenValidationError::Expired) => TokenVerification::rejected(RejectReason::Expired),
            Err(TokenValidationError::InvalidTimeWindow) => {
                TokenVerification::rejected(RejectReason::MalformedToken)
            }
        }
    }
}
