use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use keystone_auth::ScopeError;
use keystone_core::DomainError;
use keystone_infra::{AccountError, RepositoryError};

/// Generic text for every authentication failure; the reason is only logged.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Every failure an HTTP handler or gate can surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid credentials")]
    Unauthenticated,

    #[error("insufficient role")]
    Forbidden,

    #[error("tenant is suspended")]
    TenantSuspended,

    #[error("{0}")]
    PlanLimitReached(String),

    #[error("subdomain already registered")]
    DuplicateSubdomain,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    /// Detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::TenantSuspended | ApiError::PlanLimitReached(_) => {
                StatusCode::FORBIDDEN
            }
            ApiError::DuplicateSubdomain | ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "invalid_credentials",
            ApiError::Forbidden => "forbidden",
            ApiError::TenantSuspended => "tenant_suspended",
            ApiError::PlanLimitReached(_) => "plan_limit_reached",
            ApiError::DuplicateSubdomain => "duplicate_subdomain",
            ApiError::DuplicateEmail => "duplicate_email",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            ApiError::Unauthenticated => INVALID_CREDENTIALS.to_string(),
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        json_error(self.status(), self.code(), message)
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::MalformedId { .. } => ApiError::validation("invalid id"),
            DomainError::ScopeMismatch(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::DuplicateSubdomain => ApiError::DuplicateSubdomain,
            RepositoryError::DuplicateEmail => ApiError::DuplicateEmail,
            RepositoryError::NotFound => ApiError::NotFound("resource"),
            RepositoryError::LimitReached { resource, limit } => ApiError::PlanLimitReached(format!(
                "plan allows at most {limit} {resource}"
            )),
            RepositoryError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(msg) => ApiError::Validation(msg),
            AccountError::DuplicateSubdomain => ApiError::DuplicateSubdomain,
            AccountError::DuplicateEmail => ApiError::DuplicateEmail,
            AccountError::TenantNotFound => ApiError::NotFound("tenant"),
            AccountError::TenantSuspended => ApiError::TenantSuspended,
            AccountError::InvalidCredentials => ApiError::Unauthenticated,
            AccountError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(e: ScopeError) -> Self {
        match e {
            ScopeError::TenantNotFound(_) => ApiError::NotFound("tenant"),
            ScopeError::TenantSuspended(_) => ApiError::TenantSuspended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_table() {
        let cases = [
            (ApiError::Unauthenticated, 401, "invalid_credentials"),
            (ApiError::Forbidden, 403, "forbidden"),
            (ApiError::TenantSuspended, 403, "tenant_suspended"),
            (ApiError::PlanLimitReached("x".into()), 403, "plan_limit_reached"),
            (ApiError::DuplicateSubdomain, 409, "duplicate_subdomain"),
            (ApiError::DuplicateEmail, 409, "duplicate_email"),
            (ApiError::NotFound("project"), 404, "not_found"),
            (ApiError::validation("bad"), 400, "validation_error"),
            (ApiError::Internal("db down".into()), 500, "internal_error"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "{err:?}");
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn every_login_failure_maps_to_the_same_error() {
        assert_eq!(ApiError::from(AccountError::InvalidCredentials), ApiError::Unauthenticated);
        assert_eq!(
            ApiError::from(RepositoryError::LimitReached { resource: "projects", limit: 3 }),
            ApiError::PlanLimitReached("plan allows at most 3 projects".into())
        );
    }

    #[test]
    fn domain_errors_split_into_caller_and_server_faults() {
        let malformed = "nope".parse::<keystone_core::TaskId>().unwrap_err();
        assert_eq!(ApiError::from(malformed), ApiError::validation("invalid id"));
        assert_eq!(
            ApiError::from(DomainError::validation("name is required")),
            ApiError::Validation("name is required".into())
        );
        assert!(matches!(
            ApiError::from(DomainError::scope_mismatch("user without tenant")),
            ApiError::Internal(_)
        ));
    }
}
