//! `keystone-core`: domain foundation shared by every other crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model and the tenant model.

pub mod error;
pub mod id;
pub mod tenant;

pub use error::{DomainError, DomainResult};
pub use id::{ProjectId, TaskId, TenantId, UserId};
pub use tenant::{PlanLimits, Subdomain, SubscriptionPlan, Tenant, TenantStatus};
