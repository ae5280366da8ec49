use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role lattice used for RBAC.
///
/// The lattice is flat and closed: there is no configurable policy layer and no
/// implicit inheritance between roles. Whether a role spans tenants is an
/// explicit capability (`is_global_scope`), not a convention on nullable fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Cross-tenant administrator. Never bound to a tenant.
    SuperAdmin,
    /// Administrator of exactly one tenant.
    TenantAdmin,
    /// Ordinary member of exactly one tenant.
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::TenantAdmin, Role::User];

    /// Whether principals holding this role operate outside any tenant partition.
    pub fn is_global_scope(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::TenantAdmin => "tenant_admin",
            Role::User => "user",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "tenant_admin" => Ok(Role::TenantAdmin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
