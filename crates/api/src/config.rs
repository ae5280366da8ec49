//! Runtime configuration read from the environment (optionally seeded from `.env`).

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use keystone_auth::HashingCost;

pub const DEV_JWT_SECRET: &str = "keystone-dev-secret";
const DEFAULT_TOKEN_TTL_SECS: i64 = 900;
/// Tokens cannot be revoked, so their lifetime is capped at 30 days.
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Credentials of the super admin created at startup when absent.
#[derive(Clone, PartialEq, Eq)]
pub struct SuperAdminBootstrap {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl core::fmt::Debug for SuperAdminBootstrap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuperAdminBootstrap")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub hashing: HashingCost,
    pub super_admin: Option<SuperAdminBootstrap>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("token_ttl_secs", &self.token_ttl.num_seconds())
            .field("bind_addr", &self.bind_addr)
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("hashing", &self.hashing)
            .field("super_admin", &self.super_admin)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let ttl_secs: i64 = parse_or("TOKEN_TTL_SECS", get("TOKEN_TTL_SECS"), DEFAULT_TOKEN_TTL_SECS)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            return Err(ConfigError::Invalid {
                var: "TOKEN_TTL_SECS",
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            });
        }

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => parse("BIND_ADDR", &raw)?,
            None => parse("BIND_ADDR", DEFAULT_BIND_ADDR)?,
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                var: "USE_PERSISTENT_STORES",
                reason: format!("expected true/false, got '{raw}'"),
            })?,
        };
        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let defaults = HashingCost::default();
        let hashing = HashingCost {
            memory_kib: parse_or("PASSWORD_HASH_MEMORY_KIB", get("PASSWORD_HASH_MEMORY_KIB"), defaults.memory_kib)?,
            iterations: parse_or("PASSWORD_HASH_ITERATIONS", get("PASSWORD_HASH_ITERATIONS"), defaults.iterations)?,
            parallelism: parse_or(
                "PASSWORD_HASH_PARALLELISM",
                get("PASSWORD_HASH_PARALLELISM"),
                defaults.parallelism,
            )?,
        };

        let super_admin = match (get("SUPER_ADMIN_EMAIL"), get("SUPER_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SuperAdminBootstrap {
                email,
                password,
                full_name: get("SUPER_ADMIN_NAME").unwrap_or_else(|| "Super Admin".to_string()),
            }),
            (Some(_), None) => return Err(ConfigError::Missing("SUPER_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPER_ADMIN_EMAIL")),
            (None, None) => None,
        };

        Ok(Self {
            jwt_secret,
            token_ttl: Duration::seconds(ttl_secs),
            bind_addr,
            use_persistent_stores,
            database_url,
            hashing,
            super_admin,
        })
    }

    /// In-memory configuration with cheap password hashing, for tests.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            use_persistent_stores: false,
            database_url: None,
            hashing: HashingCost {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            },
            super_admin: None,
        }
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => parse(var, &raw),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(c.token_ttl, Duration::minutes(15));
        assert_eq!(c.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(!c.use_persistent_stores);
        assert_eq!(c.hashing, HashingCost::default());
        assert!(c.super_admin.is_none());
    }

    #[test]
    fn explicit_values_are_read() {
        let c = config(&[
            ("JWT_SECRET", "s3cr3t"),
            ("TOKEN_TTL_SECS", "60"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/keystone"),
            ("PASSWORD_HASH_ITERATIONS", "3"),
            ("SUPER_ADMIN_EMAIL", "root@keystone.dev"),
            ("SUPER_ADMIN_PASSWORD", "changeme"),
        ])
        .unwrap();
        assert_eq!(c.jwt_secret, "s3cr3t");
        assert_eq!(c.token_ttl, Duration::seconds(60));
        assert!(c.use_persistent_stores);
        assert_eq!(c.hashing.iterations, 3);
        let admin = c.super_admin.unwrap();
        assert_eq!(admin.full_name, "Super Admin");
        assert!(!format!("{admin:?}").contains("changeme"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("TOKEN_TTL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "TOKEN_TTL_SECS", .. })
        ));
        for too_long in ["2592001", "1000000000000000", "9223372036854775807"] {
            assert!(matches!(
                config(&[("TOKEN_TTL_SECS", too_long)]),
                Err(ConfigError::Invalid { var: "TOKEN_TTL_SECS", .. })
            ));
        }
        assert_eq!(
            config(&[("TOKEN_TTL_SECS", "2592000")]).unwrap().token_ttl,
            Duration::days(30)
        );
        assert!(matches!(
            config(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { var: "BIND_ADDR", .. })
        ));
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "1")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert_eq!(
            config(&[("SUPER_ADMIN_EMAIL", "root@x.io")]).unwrap_err(),
            ConfigError::Missing("SUPER_ADMIN_PASSWORD")
        );
    }
}
