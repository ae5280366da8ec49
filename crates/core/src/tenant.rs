//! Tenant model: the isolation boundary every other record hangs off.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, TenantId};

/// Upper bound on subdomain length (a single DNS label).
pub const MAX_SUBDOMAIN_LEN: usize = 63;

/// Human-chosen, globally unique tenant handle used to select a tenant at login.
///
/// Always lowercase ASCII alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subdomain(String);

impl Subdomain {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("subdomain is required"));
        }
        if value.len() > MAX_SUBDOMAIN_LEN {
            return Err(DomainError::validation(format!(
                "subdomain must be at most {MAX_SUBDOMAIN_LEN} characters"
            )));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(DomainError::validation(
                "subdomain must contain lowercase letters and numbers only",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Subdomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subdomain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Subdomain> for String {
    fn from(value: Subdomain) -> Self {
        value.0
    }
}

/// Tenant lifecycle status. Only a super admin changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
        }
    }
}

impl core::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            other => Err(DomainError::validation(format!(
                "unknown tenant status '{other}' (expected active or suspended)"
            ))),
        }
    }
}

/// Resource ceilings granted by a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_users: u32,
    pub max_projects: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn limits(&self) -> PlanLimits {
        match self {
            SubscriptionPlan::Free => PlanLimits {
                max_users: 5,
                max_projects: 3,
            },
            SubscriptionPlan::Pro => PlanLimits {
                max_users: 25,
                max_projects: 15,
            },
            SubscriptionPlan::Enterprise => PlanLimits {
                max_users: 100,
                max_projects: 50,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Pro => "pro",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl core::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPlan {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionPlan::Free),
            "pro" => Ok(SubscriptionPlan::Pro),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            other => Err(DomainError::validation(format!(
                "unknown subscription plan '{other}' (expected free, pro or enterprise)"
            ))),
        }
    }
}

/// An isolated customer organization.
///
/// # Invariants
/// - `subdomain` is immutable once registered.
/// - `max_users` / `max_projects` always equal the limits of `subscription_plan`.
/// - Tenants are never hard-deleted; suspension is the way to disable one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub subdomain: Subdomain,
    pub status: TenantStatus,
    pub subscription_plan: SubscriptionPlan,
    pub max_users: u32,
    pub max_projects: u32,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// A freshly self-registered tenant: active, on the default plan.
    pub fn register(name: &str, subdomain: Subdomain, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = Self::normalize_name(name)?;
        let plan = SubscriptionPlan::default();
        let limits = plan.limits();
        Ok(Self {
            id: TenantId::new(),
            name,
            subdomain,
            status: TenantStatus::Active,
            subscription_plan: plan,
            max_users: limits.max_users,
            max_projects: limits.max_projects,
            created_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Trimmed display name; empty names are rejected.
    pub fn normalize_name(name: &str) -> DomainResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("tenant name is required"));
        }
        Ok(name.to_string())
    }

    pub fn change_plan(&mut self, plan: SubscriptionPlan) {
        let limits = plan.limits();
        self.subscription_plan = plan;
        self.max_users = limits.max_users;
        self.max_projects = limits.max_projects;
    }

    pub fn set_status(&mut self, status: TenantStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn subdomain_accepts_lowercase_alphanumeric() {
        assert_eq!(Subdomain::parse("acme42").unwrap().as_str(), "acme42");
        assert_eq!(Subdomain::parse("  beta ").unwrap().as_str(), "beta");
    }

    #[test]
    fn subdomain_rejects_uppercase_symbols_and_empty() {
        for bad in ["", "Acme", "acme-co", "acme.io", "ac me", "ünï"] {
            assert!(Subdomain::parse(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(Subdomain::parse(&"a".repeat(MAX_SUBDOMAIN_LEN + 1)).is_err());
    }

    #[test]
    fn registration_uses_free_plan_limits() {
        let t = Tenant::register("Acme", Subdomain::parse("acme").unwrap(), Utc::now()).unwrap();
        assert!(t.is_active());
        assert_eq!(t.subscription_plan, SubscriptionPlan::Free);
        assert_eq!((t.max_users, t.max_projects), (5, 3));
    }

    #[test]
    fn registration_requires_a_name() {
        assert!(Tenant::register("   ", Subdomain::parse("acme").unwrap(), Utc::now()).is_err());
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(Tenant::normalize_name("  Acme Co ").unwrap(), "Acme Co");
        assert!(Tenant::normalize_name("\t").is_err());
    }

    #[test]
    fn plan_change_moves_ceilings_with_it() {
        let mut t = Tenant::register("Acme", Subdomain::parse("acme").unwrap(), Utc::now()).unwrap();
        t.change_plan(SubscriptionPlan::Pro);
        assert_eq!((t.max_users, t.max_projects), (25, 15));
        t.change_plan(SubscriptionPlan::Enterprise);
        assert_eq!((t.max_users, t.max_projects), (100, 50));
    }

    #[test]
    fn status_and_plan_parse_from_wire_names() {
        assert_eq!("suspended".parse::<TenantStatus>().unwrap(), TenantStatus::Suspended);
        assert_eq!("pro".parse::<SubscriptionPlan>().unwrap(), SubscriptionPlan::Pro);
        assert!("gold".parse::<SubscriptionPlan>().is_err());
    }

    proptest! {
        #[test]
        fn any_parsed_subdomain_is_lowercase_alphanumeric(raw in "\\PC{0,20}") {
            if let Ok(s) = Subdomain::parse(&raw) {
                prop_assert!(s.as_str().bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
                prop_assert!(!s.as_str().is_empty());
            }
        }
    }
}
