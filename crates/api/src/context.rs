//! Per-request context placed in request extensions by the middleware pipeline.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use keystone_auth::{Principal, Role};
use keystone_core::{Tenant, TenantId, UserId};

use crate::app::errors::ApiError;

/// Authenticated identity for a request. Inserted by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.subject_id()
    }

    pub fn role(&self) -> Role {
        self.principal.role()
    }
}

/// Tenant context for a request.
///
/// Present only after the tenant gate has bound the request to the principal's
/// own, currently active tenant. Immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant: Tenant,
}

impl TenantContext {
    pub fn new(tenant: Tenant) -> Self {
        Self { tenant }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }
}

/// Transport facts recorded in the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
}

pub const FORWARDED_FOR: &str = "x-forwarded-for";

impl RequestMeta {
    /// First `X-Forwarded-For` entry, else the peer address.
    pub fn from_parts(parts: &Parts) -> Self {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Self { ip_address }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PrincipalContext>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    /// A handler asking for a tenant on a route without the tenant gate is a
    /// wiring bug, and a global principal has no tenant to give.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or(ApiError::Forbidden)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestMeta::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(forwarded: Option<&str>, peer: Option<SocketAddr>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(f) = forwarded {
            builder = builder.header(FORWARDED_FOR, f);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(addr) = peer {
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let peer = SocketAddr::from(([10, 0, 0, 9], 4000));
        let meta = RequestMeta::from_parts(&parts(Some("203.0.113.7, 10.0.0.1"), Some(peer)));
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let peer = SocketAddr::from(([10, 0, 0, 9], 4000));
        assert_eq!(
            RequestMeta::from_parts(&parts(None, Some(peer))).ip_address.as_deref(),
            Some("10.0.0.9")
        );
        assert_eq!(RequestMeta::from_parts(&parts(None, None)).ip_address, None);
    }
}
