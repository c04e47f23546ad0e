//! Management hierarchy trait and common types.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the management hierarchy API.
#[derive(Error, Debug)]
pub enum RemoteApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication or authorization error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteApiError {
    /// Whether the remote side reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Hierarchy types
// ============================================================================

/// A subscription sitting under a management group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    /// Stable subscription id (the GUID).
    pub id: String,
    /// Mutable display name.
    pub display_name: String,
    /// Fully qualified resource id of the membership.
    pub fully_qualified_id: String,
    /// Group the subscription currently sits under, when reported.
    pub parent_group_id: Option<String>,
}

/// Kind of a hierarchy entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A management group.
    ManagementGroup,
    /// A subscription.
    Subscription,
    /// Anything else the API may return.
    Other(String),
}

/// Read-only view of a node in the management hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Short name; for subscriptions this is the subscription id.
    pub name: String,
    /// Fully qualified resource id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Id of the parent management group, if any.
    pub parent_group_id: Option<String>,
}

impl Entity {
    /// Check whether this entity is the subscription with the given id.
    #[must_use]
    pub fn is_subscription(&self, subscription_id: &str) -> bool {
        self.kind == EntityKind::Subscription && self.name == subscription_id
    }
}

/// Response of a rename call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedMember {
    /// Id of the renamed subscription.
    pub id: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation token for the next page, `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Remote management hierarchy operations.
///
/// Every call is a single round trip with no retries and no caching.
#[async_trait]
pub trait HierarchyApi: Send + Sync {
    /// Fetch one page of the subscriptions directly under `group_id`.
    async fn list_members_page(
        &self,
        group_id: &str,
        continuation: Option<&str>,
    ) -> Result<Page<PoolMember>, RemoteApiError>;

    /// Fetch one page of all hierarchy entities visible to the caller.
    async fn list_entities_page(
        &self,
        continuation: Option<&str>,
    ) -> Result<Page<Entity>, RemoteApiError>;

    /// Get a single subscription under `group_id`.
    ///
    /// The default implementation scans [`HierarchyApi::list_members_page`].
    async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<PoolMember, RemoteApiError> {
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .list_members_page(group_id, continuation.as_deref())
                .await?;
            if let Some(member) = page.items.into_iter().find(|m| m.id == member_id) {
                return Ok(member);
            }
            match page.next {
                Some(next) => continuation = Some(next),
                None => {
                    return Err(RemoteApiError::NotFound(format!(
                        "subscription '{member_id}' under group '{group_id}'"
                    )))
                }
            }
        }
    }

    /// Move a subscription under `group_id`.
    async fn move_member(
        &self,
        member_id: &str,
        group_id: &str,
    ) -> Result<PoolMember, RemoteApiError>;

    /// Rename a subscription.
    async fn rename_member(
        &self,
        member_id: &str,
        new_name: &str,
    ) -> Result<RenamedMember, RemoteApiError>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily stream every subscription under `group_id`, page by page.
pub fn members_under_group<'a, A>(
    api: &'a A,
    group_id: &'a str,
) -> BoxStream<'a, Result<PoolMember, RemoteApiError>>
where
    A: HierarchyApi + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let continuation = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok::<_, RemoteApiError>(None),
        };
        let page = api
            .list_members_page(group_id, continuation.as_deref())
            .await?;
        let next = page.next.map_or(Cursor::Done, Cursor::Next);
        let items = stream::iter(page.items.into_iter().map(Ok::<_, RemoteApiError>));
        Ok(Some((items, next)))
    })
    .try_flatten()
    .boxed()
}

/// Lazily stream every hierarchy entity, page by page.
pub fn hierarchy_entities<A>(api: &A) -> BoxStream<'_, Result<Entity, RemoteApiError>>
where
    A: HierarchyApi + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let continuation = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok::<_, RemoteApiError>(None),
        };
        let page = api.list_entities_page(continuation.as_deref()).await?;
        let next = page.next.map_or(Cursor::Done, Cursor::Next);
        let items = stream::iter(page.items.into_iter().map(Ok::<_, RemoteApiError>));
        Ok(Some((items, next)))
    })
    .try_flatten()
    .boxed()
}
