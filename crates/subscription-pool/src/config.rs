//! Process-wide pool configuration.
//!
//! Every setting resolves from an explicit value first, then from its
//! environment variable, then from a built-in default where one exists.
//! Empty strings count as unset.

use std::path::Path;

use serde::Deserialize;

use crate::error::{PoolError, Result};

/// Default management group holding the pool.
pub const DEFAULT_POOL_MANAGEMENT_GROUP: &str = "Crossnative";

/// Default display name prefix of pool subscriptions.
pub const DEFAULT_POOL_NAME_PREFIX: &str = "Azure_Subscription_Crossnative_Pool_";

/// Environment variable for the tenant id.
pub const ENV_TENANT_ID: &str = "ARM_TENANT_ID";
/// Environment variable for the client id.
pub const ENV_CLIENT_ID: &str = "ARM_CLIENT_ID";
/// Environment variable for the client secret.
pub const ENV_CLIENT_SECRET: &str = "ARM_CLIENT_SECRET";
/// Environment variable for the pool management group.
pub const ENV_POOL_MANAGEMENT_GROUP: &str = "SUBSCRIPTION_POOL_MANAGEMENT_GROUP";
/// Environment variable for the pool name prefix.
pub const ENV_POOL_NAME_PREFIX: &str = "SUBSCRIPTION_POOL_NAME_PREFIX";

/// Explicitly configured values, any of which may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfigOverrides {
    /// Azure AD tenant id.
    pub tenant_id: Option<String>,
    /// Service principal client id.
    pub client_id: Option<String>,
    /// Service principal secret.
    pub client_secret: Option<String>,
    /// Management group holding the pool.
    #[serde(rename = "subscription_pool_management_group")]
    pub pool_management_group: Option<String>,
    /// Display name prefix of pool subscriptions.
    #[serde(rename = "subscription_pool_name_prefix")]
    pub pool_name_prefix: Option<String>,
}

impl PoolConfigOverrides {
    /// Load overrides from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Fill fields left unset here from the TOML file at `path`, if any.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn with_file(self, path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(self.or(Self::from_toml_file(path)?)),
            None => Ok(self),
        }
    }

    /// Fill every field left unset here from `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            tenant_id: self.tenant_id.or(other.tenant_id),
            client_id: self.client_id.or(other.client_id),
            client_secret: self.client_secret.or(other.client_secret),
            pool_management_group: self.pool_management_group.or(other.pool_management_group),
            pool_name_prefix: self.pool_name_prefix.or(other.pool_name_prefix),
        }
    }
}

/// Resolved pool configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// Service principal client id.
    pub client_id: String,
    /// Service principal secret.
    pub client_secret: String,
    /// Management group holding the pool.
    pub pool_parent_group_id: String,
    /// Display name prefix of pool subscriptions.
    pub pool_name_prefix: String,
}

impl PoolConfig {
    /// Resolve configuration against the process environment.
    ///
    /// # Errors
    /// Returns [`PoolError::Configuration`] naming every missing field.
    pub fn from_env(overrides: PoolConfigOverrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration using `lookup` for environment values.
    ///
    /// # Errors
    /// Returns [`PoolError::Configuration`] naming every missing field.
    pub fn resolve<F>(overrides: PoolConfigOverrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, env_key: &str| {
            non_empty(explicit).or_else(|| non_empty(lookup(env_key)))
        };

        let tenant_id = pick(overrides.tenant_id, ENV_TENANT_ID);
        let client_id = pick(overrides.client_id, ENV_CLIENT_ID);
        let client_secret = pick(overrides.client_secret, ENV_CLIENT_SECRET);
        let pool_parent_group_id = pick(overrides.pool_management_group, ENV_POOL_MANAGEMENT_GROUP)
            .unwrap_or_else(|| DEFAULT_POOL_MANAGEMENT_GROUP.to_string());
        let pool_name_prefix = pick(overrides.pool_name_prefix, ENV_POOL_NAME_PREFIX)
            .unwrap_or_else(|| DEFAULT_POOL_NAME_PREFIX.to_string());

        let mut missing = Vec::new();
        if tenant_id.is_none() {
            missing.push("tenant_id");
        }
        if client_id.is_none() {
            missing.push("client_id");
        }
        if client_secret.is_none() {
            missing.push("client_secret");
        }

        match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(Self {
                tenant_id,
                client_id,
                client_secret,
                pool_parent_group_id,
                pool_name_prefix,
            }),
            _ => Err(PoolError::Configuration { missing }),
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("pool_parent_group_id", &self.pool_parent_group_id)
            .field("pool_name_prefix", &self.pool_name_prefix)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
