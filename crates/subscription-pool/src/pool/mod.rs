//! Subscription pool built once from a management group scan.

mod queue;
mod scanner;

pub use queue::AllocationQueue;
pub use scanner::scan_pool;

use tracing::{info, warn};

use crate::error::{PoolError, Result};
use crate::providers::HierarchyApi;

/// The set of pool subscriptions not yet leased by this process.
///
/// A `Pool` is built once and shared by reference (usually behind an `Arc`)
/// with every lease controller. Released subscriptions go back to the pool
/// management group remotely but are not handed out again by this instance.
#[derive(Debug)]
pub struct Pool {
    parent_group_id: String,
    name_prefix: String,
    queue: AllocationQueue,
}

impl Pool {
    /// Build a pool from an already known list of subscription ids.
    #[must_use]
    pub fn new(
        parent_group_id: impl Into<String>,
        name_prefix: impl Into<String>,
        ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            parent_group_id: parent_group_id.into(),
            name_prefix: name_prefix.into(),
            queue: AllocationQueue::sealed(ids),
        }
    }

    /// Scan `parent_group_id` and seal every subscription matching
    /// `name_prefix` into a new pool.
    ///
    /// # Errors
    /// Returns [`PoolError::Remote`] if the listing fails.
    pub async fn scan<A>(
        api: &A,
        parent_group_id: impl Into<String>,
        name_prefix: impl Into<String>,
    ) -> Result<Self>
    where
        A: HierarchyApi + ?Sized,
    {
        let parent_group_id = parent_group_id.into();
        let name_prefix = name_prefix.into();
        let ids = scan_pool(api, &parent_group_id, &name_prefix).await?;

        if ids.is_empty() {
            warn!(
                group_id = %parent_group_id,
                prefix = %name_prefix,
                "Subscription pool is empty"
            );
        }

        Ok(Self::new(parent_group_id, name_prefix, ids))
    }

    /// Management group holding the pool.
    #[must_use]
    pub fn parent_group_id(&self) -> &str {
        &self.parent_group_id
    }

    /// Display name prefix of pool subscriptions.
    #[must_use]
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Subscriptions not yet allocated.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.remaining()
    }

    /// Subscriptions the pool was built with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Allocate one subscription id.
    ///
    /// # Errors
    /// Returns [`PoolError::PoolExhausted`] once every id has been handed out.
    pub fn take(&self) -> Result<String> {
        let id = self.queue.take().ok_or_else(|| PoolError::PoolExhausted {
            prefix: self.name_prefix.clone(),
            parent_group_id: self.parent_group_id.clone(),
        })?;

        info!(
            subscription_id = %id,
            remaining = self.queue.remaining(),
            "Allocated subscription from pool"
        );

        Ok(id)
    }
}
