//! One-shot inventory scan of the pool management group.

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::providers::{members_under_group, HierarchyApi};

/// List the ids of every subscription under `parent_group_id` whose display
/// name starts with `name_prefix`, in listing order.
///
/// # Errors
/// Any remote failure aborts the scan; no partial result is returned.
pub async fn scan_pool<A>(
    api: &A,
    parent_group_id: &str,
    name_prefix: &str,
) -> Result<Vec<String>>
where
    A: HierarchyApi + ?Sized,
{
    info!(
        group_id = %parent_group_id,
        prefix = %name_prefix,
        "Scanning subscription pool"
    );

    let mut scanned = 0usize;
    let matched: Vec<String> = members_under_group(api, parent_group_id)
        .try_filter_map(|member| {
            scanned += 1;
            let keep = member.display_name.starts_with(name_prefix);
            if !keep {
                debug!(
                    subscription_id = %member.id,
                    display_name = %member.display_name,
                    "Skipping subscription without pool prefix"
                );
            }
            futures::future::ready(Ok(keep.then_some(member.id)))
        })
        .try_collect()
        .await
        .map_err(|e| {
            PoolError::remote(format!("list subscriptions under '{parent_group_id}'"), e)
        })?;

    info!(
        group_id = %parent_group_id,
        scanned,
        available = matched.len(),
        "Subscription pool scanned"
    );

    Ok(matched)
}
