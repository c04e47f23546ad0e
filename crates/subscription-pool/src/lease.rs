//! Lease lifecycle for pool subscriptions.
//!
//! A lease moves through `Unleased -> Leased (create) -> Reconciled (read)
//! -> Relocated (update) -> Released (delete)`. Every transition issues the
//! move before the rename. The two calls are not transactional: when the
//! move succeeds and the rename fails, the subscription stays moved under
//! its new group with its old name, and the error is returned as is.

use std::sync::Arc;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PoolError, Result};
use crate::pool::Pool;
use crate::providers::{hierarchy_entities, HierarchyApi};

/// Longest display name the subscription API accepts.
pub const MAX_SUBSCRIPTION_NAME_LEN: usize = 64;

/// Desired placement of a leased subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSpec {
    /// Management group the subscription should live under.
    pub target_group_id: String,
    /// Display name the subscription should carry.
    pub target_name: String,
}

impl LeaseSpec {
    /// Create a lease spec.
    #[must_use]
    pub fn new(target_group_id: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            target_group_id: target_group_id.into(),
            target_name: target_name.into(),
        }
    }
}

/// Tracked state of one lease, persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Leased subscription id. Never changes once assigned.
    pub subscription_id: String,
    /// Subscription resource id, always `/subscriptions/{subscription_id}`.
    #[serde(rename = "fully_qualified_subscription_id")]
    pub fully_qualified_id: String,
    /// Requested management group.
    #[serde(rename = "target_management_group_name")]
    pub target_group_id: String,
    /// Requested (or last observed) display name.
    #[serde(rename = "target_subscription_name")]
    pub target_name: String,
    /// Management group the subscription actually sits under.
    #[serde(rename = "actual_parent_management_group")]
    pub actual_parent_group_id: String,
}

impl LeaseRecord {
    /// The placement this record currently describes.
    #[must_use]
    pub fn spec(&self) -> LeaseSpec {
        LeaseSpec::new(&self.target_group_id, &self.target_name)
    }
}

/// Cut `s` down to at most `max_chars` characters.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Resource id of a subscription, independent of where it sits in the
/// management hierarchy.
#[must_use]
pub fn subscription_resource_id(subscription_id: &str) -> String {
    format!("/subscriptions/{subscription_id}")
}

/// Name a released subscription gets when it goes back to the pool.
#[must_use]
pub fn pool_return_name(name_prefix: &str, subscription_id: &str) -> String {
    truncate(&format!("{name_prefix}{subscription_id}"), MAX_SUBSCRIPTION_NAME_LEN).to_string()
}

/// Drives lease transitions against the management hierarchy.
///
/// Controllers are cheap to clone. Many may run concurrently against the
/// same [`Pool`]; the pool's queue is the only shared mutable state.
pub struct LeaseController<A: ?Sized> {
    api: Arc<A>,
    pool: Arc<Pool>,
}

impl<A: ?Sized> Clone for LeaseController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<A> LeaseController<A>
where
    A: HierarchyApi + ?Sized,
{
    /// Create a controller bound to `pool`.
    #[must_use]
    pub fn new(api: Arc<A>, pool: Arc<Pool>) -> Self {
        Self { api, pool }
    }

    /// The pool this controller allocates from.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Lease a subscription: allocate, move, then rename.
    ///
    /// The allocated subscription is consumed even if a later step fails.
    ///
    /// # Errors
    /// - [`PoolError::PoolExhausted`] when nothing is left to allocate.
    /// - [`PoolError::Remote`] when the move or the rename fails.
    pub async fn create(&self, spec: &LeaseSpec) -> Result<LeaseRecord> {
        let subscription_id = self.pool.take()?;

        info!(
            subscription_id = %subscription_id,
            target_group_id = %spec.target_group_id,
            target_name = %spec.target_name,
            "Leasing subscription"
        );

        let moved = self
            .api
            .move_member(&subscription_id, &spec.target_group_id)
            .await
            .map_err(|e| {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Move failed; subscription is no longer available in this pool"
                );
                PoolError::remote(
                    format!(
                        "move subscription '{subscription_id}' to '{}'",
                        spec.target_group_id
                    ),
                    e,
                )
            })?;

        let mut record = LeaseRecord {
            subscription_id: subscription_id.clone(),
            fully_qualified_id: subscription_resource_id(&subscription_id),
            target_group_id: spec.target_group_id.clone(),
            target_name: moved.display_name,
            actual_parent_group_id: spec.target_group_id.clone(),
        };

        self.api
            .rename_member(&subscription_id, &spec.target_name)
            .await
            .map_err(|e| {
                warn!(
                    subscription_id = %subscription_id,
                    group_id = %record.actual_parent_group_id,
                    error = %e,
                    "Subscription moved but not renamed"
                );
                PoolError::remote(
                    format!(
                        "rename subscription '{subscription_id}' to '{}'",
                        spec.target_name
                    ),
                    e,
                )
            })?;
        record.target_name.clone_from(&spec.target_name);

        info!(
            subscription_id = %record.subscription_id,
            group_id = %record.actual_parent_group_id,
            "Subscription leased"
        );

        Ok(record)
    }

    /// Rebuild the record for `subscription_id` from the remote hierarchy.
    ///
    /// Moves and renames made outside this system are taken over as is.
    ///
    /// # Errors
    /// - [`PoolError::BrokenState`] when the subscription is not in the hierarchy.
    /// - [`PoolError::Remote`] when the entity listing fails.
    pub async fn read(&self, subscription_id: &str) -> Result<LeaseRecord> {
        debug!(subscription_id = %subscription_id, "Reading subscription state");

        let entity = hierarchy_entities(&*self.api)
            .try_filter(|entity| futures::future::ready(entity.is_subscription(subscription_id)))
            .try_next()
            .await
            .map_err(|e| PoolError::remote("list management hierarchy entities", e))?
            .ok_or_else(|| PoolError::BrokenState {
                subscription_id: subscription_id.to_string(),
                group_id: None,
            })?;

        let actual_parent_group_id = entity.parent_group_id.unwrap_or_else(|| {
            warn!(subscription_id = %subscription_id, "Subscription entity has no parent group");
            String::new()
        });

        Ok(LeaseRecord {
            fully_qualified_id: subscription_resource_id(&entity.name),
            subscription_id: entity.name,
            target_group_id: actual_parent_group_id.clone(),
            target_name: entity.display_name,
            actual_parent_group_id,
        })
    }

    /// Refresh an existing record in place from the remote hierarchy.
    ///
    /// # Errors
    /// Same as [`LeaseController::read`].
    pub async fn refresh(&self, record: &mut LeaseRecord) -> Result<()> {
        let observed = self.read(&record.subscription_id).await?;

        if observed.actual_parent_group_id != record.actual_parent_group_id
            || observed.target_name != record.target_name
        {
            info!(
                subscription_id = %record.subscription_id,
                tracked_group = %record.actual_parent_group_id,
                actual_group = %observed.actual_parent_group_id,
                tracked_name = %record.target_name,
                actual_name = %observed.target_name,
                "Subscription drifted from tracked state"
            );
        }

        record.fully_qualified_id = observed.fully_qualified_id;
        record.target_name = observed.target_name;
        record.actual_parent_group_id = observed.actual_parent_group_id;
        Ok(())
    }

    /// Adopt an existing subscription by id.
    ///
    /// # Errors
    /// Same as [`LeaseController::read`].
    pub async fn import(&self, subscription_id: &str) -> Result<LeaseRecord> {
        info!(subscription_id = %subscription_id, "Importing subscription lease");
        self.read(subscription_id).await
    }

    /// Bring a leased subscription to `desired`, moving and renaming only
    /// what differs.
    ///
    /// `record` is updated as each step lands, so after a failed rename it
    /// already reflects the completed move.
    ///
    /// # Errors
    /// - [`PoolError::BrokenState`] when the subscription is not under its
    ///   tracked group.
    /// - [`PoolError::Remote`] when a lookup, move, or rename fails.
    pub async fn update(&self, record: &mut LeaseRecord, desired: &LeaseSpec) -> Result<()> {
        let subscription_id = record.subscription_id.clone();
        let tracked_group = record.actual_parent_group_id.clone();

        let current = self
            .api
            .get_member(&tracked_group, &subscription_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PoolError::BrokenState {
                        subscription_id: subscription_id.clone(),
                        group_id: Some(tracked_group.clone()),
                    }
                } else {
                    PoolError::remote(
                        format!(
                            "look up subscription '{subscription_id}' under '{tracked_group}'"
                        ),
                        e,
                    )
                }
            })?;

        record.target_group_id.clone_from(&desired.target_group_id);
        record.fully_qualified_id = subscription_resource_id(&subscription_id);

        if tracked_group == desired.target_group_id {
            debug!(subscription_id = %subscription_id, "Group unchanged, skipping move");
        } else {
            info!(
                subscription_id = %subscription_id,
                from = %tracked_group,
                to = %desired.target_group_id,
                "Relocating subscription"
            );
            self.api
                .move_member(&subscription_id, &desired.target_group_id)
                .await
                .map_err(|e| {
                    PoolError::remote(
                        format!(
                            "move subscription '{subscription_id}' to '{}'",
                            desired.target_group_id
                        ),
                        e,
                    )
                })?;
        }
        record
            .actual_parent_group_id
            .clone_from(&desired.target_group_id);

        if current.display_name == desired.target_name {
            debug!(subscription_id = %subscription_id, "Name unchanged, skipping rename");
        } else {
            self.api
                .rename_member(&subscription_id, &desired.target_name)
                .await
                .map_err(|e| {
                    warn!(
                        subscription_id = %subscription_id,
                        group_id = %record.actual_parent_group_id,
                        error = %e,
                        "Subscription relocated but not renamed"
                    );
                    PoolError::remote(
                        format!(
                            "rename subscription '{subscription_id}' to '{}'",
                            desired.target_name
                        ),
                        e,
                    )
                })?;
        }
        record.target_name.clone_from(&desired.target_name);

        Ok(())
    }

    /// Release a lease: move the subscription back to the pool group and
    /// give it a pool name.
    ///
    /// The subscription is not handed out again by this process.
    ///
    /// # Errors
    /// Returns [`PoolError::Remote`] when the move or the rename fails.
    pub async fn delete(&self, record: &LeaseRecord) -> Result<()> {
        let subscription_id = record.subscription_id.as_str();
        let pool_group = self.pool.parent_group_id();

        info!(
            subscription_id = %subscription_id,
            group_id = %pool_group,
            "Releasing subscription to pool"
        );

        self.api
            .move_member(subscription_id, pool_group)
            .await
            .map_err(|e| {
                PoolError::remote(
                    format!("move subscription '{subscription_id}' back to pool '{pool_group}'"),
                    e,
                )
            })?;

        let name = pool_return_name(self.pool.name_prefix(), subscription_id);
        self.api
            .rename_member(subscription_id, &name)
            .await
            .map_err(|e| {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Subscription returned to pool group but not renamed"
                );
                PoolError::remote(
                    format!("rename subscription '{subscription_id}' to '{name}'"),
                    e,
                )
            })?;

        info!(subscription_id = %subscription_id, name = %name, "Subscription released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_input_unchanged() {
        assert_eq!(truncate("Pool_sub-123", 64), "Pool_sub-123");
        assert_eq!(truncate("", 64), "");
    }

    #[test]
    fn test_truncate_exact_and_long() {
        let exact = "a".repeat(64);
        assert_eq!(truncate(&exact, 64), exact);

        let long = format!("{}tail", "b".repeat(64));
        assert_eq!(truncate(&long, 64), "b".repeat(64));
    }

    #[test]
    fn test_truncate_counts_characters() {
        let s = "é".repeat(70);
        let cut = truncate(&s, 64);
        assert_eq!(cut.chars().count(), 64);
    }

    #[test]
    fn test_pool_return_name() {
        assert_eq!(pool_return_name("Pool_", "sub-123"), "Pool_sub-123");

        let name = pool_return_name(
            "Azure_Subscription_Crossnative_Pool_",
            "0b1f6471-1bf0-4dda-aec3-cb9272f09590",
        );
        assert_eq!(name.len(), MAX_SUBSCRIPTION_NAME_LEN);
        assert!(name.starts_with("Azure_Subscription_Crossnative_Pool_0b1f6471"));
    }

    #[test]
    fn test_record_uses_host_attribute_names() {
        let record = LeaseRecord {
            subscription_id: "sub-1".to_string(),
            fully_qualified_id: "/subscriptions/sub-1".to_string(),
            target_group_id: "cn-sandbox".to_string(),
            target_name: "team-a".to_string(),
            actual_parent_group_id: "cn-sandbox".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fully_qualified_subscription_id"], "/subscriptions/sub-1");
        assert_eq!(json["target_management_group_name"], "cn-sandbox");
        assert_eq!(json["target_subscription_name"], "team-a");
        assert_eq!(json["actual_parent_management_group"], "cn-sandbox");
        assert_eq!(record.spec(), LeaseSpec::new("cn-sandbox", "team-a"));
    }
}
