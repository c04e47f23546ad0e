//! Error types for pool allocation and lease transitions.

use thiserror::Error;

use crate::providers::RemoteApiError;

/// Errors surfaced by pool initialization and lease transitions.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Credentials or pool settings are missing after resolution.
    #[error("Missing configuration: {}", missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// No subscription is left to allocate.
    #[error(
        "No subscription left in pool: prefix '{prefix}' in management group '{parent_group_id}'"
    )]
    PoolExhausted {
        prefix: String,
        parent_group_id: String,
    },

    /// A tracked subscription is not where the lease says it is.
    #[error("Broken state: subscription '{subscription_id}' not found{}", under_group(group_id.as_deref()))]
    BrokenState {
        subscription_id: String,
        group_id: Option<String>,
    },

    /// A remote call failed.
    #[error("Failed to {action}: {source}")]
    Remote {
        action: String,
        source: RemoteApiError,
    },
}

impl PoolError {
    /// Wrap a remote failure with a description of what was attempted.
    pub fn remote(action: impl Into<String>, source: RemoteApiError) -> Self {
        Self::Remote {
            action: action.into(),
            source,
        }
    }
}

fn under_group(group_id: Option<&str>) -> String {
    group_id
        .map(|g| format!(" under management group '{g}'"))
        .unwrap_or_default()
}

/// Result alias for pool operations.
pub type Result<T, E = PoolError> = std::result::Result<T, E>;
