//! Azure management group API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::auth::AccessToken;
use super::models::{
    group_id_from_resource_id, EntityInfo, EntityListResponse, RenameSubscriptionRequest,
    RenamedSubscriptionId, SubscriptionUnderManagementGroup,
    SubscriptionUnderManagementGroupListResponse, MANAGEMENT_GROUP_ENTITY_TYPE,
    SUBSCRIPTION_ENTITY_TYPE,
};
use crate::providers::traits::{
    Entity, EntityKind, HierarchyApi, Page, PoolMember, RemoteApiError, RenamedMember,
};

/// Azure Resource Manager endpoint.
pub const ARM_BASE_URL: &str = "https://management.azure.com";

/// Azure API version for Management Groups.
const MANAGEMENT_GROUPS_API_VERSION: &str = "2021-04-01";

/// Azure API version for Subscription.
const SUBSCRIPTION_API_VERSION: &str = "2021-10-01";

/// Azure management group hierarchy client.
#[derive(Clone)]
pub struct AzureHierarchy {
    /// HTTP client.
    client: Client,
    /// ARM base URL.
    base_url: String,
    /// Access token.
    access_token: AccessToken,
}

impl AzureHierarchy {
    /// Create a new client.
    ///
    /// No request timeout is applied; a stalled call stalls its caller.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(access_token: AccessToken) -> Result<Self, RemoteApiError> {
        Self::build(access_token, None)
    }

    /// Create a new client with a per-request timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_timeout(
        access_token: AccessToken,
        timeout: Duration,
    ) -> Result<Self, RemoteApiError> {
        Self::build(access_token, Some(timeout))
    }

    fn build(access_token: AccessToken, timeout: Option<Duration>) -> Result<Self, RemoteApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(RemoteApiError::Http)?;

        Ok(Self {
            client,
            base_url: ARM_BASE_URL.to_string(),
            access_token,
        })
    }

    /// Point the client at a different ARM endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn group_subscriptions_url(&self, group_id: &str) -> String {
        format!(
            "{}/providers/Microsoft.Management/managementGroups/{}/subscriptions?api-version={}",
            self.base_url, group_id, MANAGEMENT_GROUPS_API_VERSION
        )
    }

    fn group_subscription_url(&self, group_id: &str, subscription_id: &str) -> String {
        format!(
            "{}/providers/Microsoft.Management/managementGroups/{}/subscriptions/{}?api-version={}",
            self.base_url, group_id, subscription_id, MANAGEMENT_GROUPS_API_VERSION
        )
    }

    fn entities_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.Management/getEntities?api-version={}",
            self.base_url, MANAGEMENT_GROUPS_API_VERSION
        )
    }

    fn rename_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/subscriptions/{}/providers/Microsoft.Subscription/rename?api-version={}",
            self.base_url, subscription_id, SUBSCRIPTION_API_VERSION
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.secret())
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RemoteApiError> {
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated PUT request without a body.
    async fn put_empty<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, RemoteApiError> {
        debug!(url = %url, "PUT request");

        let response = self
            .client
            .put(url)
            .header("Authorization", self.bearer())
            .header("Content-Length", "0")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request.
    async fn post<T, B>(&self, url: &str, body: Option<&B>) -> Result<T, RemoteApiError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "POST request");

        let mut request = self.client.post(url).header("Authorization", self.bearer());
        request = match body {
            Some(body) => request.json(body),
            None => request.header("Content-Length", "0"),
        };
        let response = request.send().await?;

        Self::handle_response(response).await
    }

    /// Handle API response.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                RemoteApiError::Serialization(e)
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(RemoteApiError::NotFound(text))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(RemoteApiError::Auth(text))
        } else {
            Err(RemoteApiError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    /// Convert a subscription membership to our type.
    fn to_member(sub: SubscriptionUnderManagementGroup) -> PoolMember {
        let parent_group_id = sub
            .properties
            .parent
            .and_then(|p| p.id)
            .map(|id| group_id_from_resource_id(&id).to_string());

        PoolMember {
            display_name: sub.properties.display_name.unwrap_or_default(),
            fully_qualified_id: sub.id,
            id: sub.name,
            parent_group_id,
        }
    }

    /// Convert an entity to our type.
    fn to_entity(entity: EntityInfo) -> Entity {
        let kind = match entity.entity_type.as_str() {
            SUBSCRIPTION_ENTITY_TYPE => EntityKind::Subscription,
            MANAGEMENT_GROUP_ENTITY_TYPE => EntityKind::ManagementGroup,
            other => EntityKind::Other(other.to_string()),
        };

        let parent_group_id = entity
            .properties
            .parent
            .and_then(|p| p.id)
            .map(|id| group_id_from_resource_id(&id).to_string());

        Entity {
            kind,
            display_name: entity.properties.display_name.unwrap_or_default(),
            name: entity.name,
            id: entity.id,
            parent_group_id,
        }
    }
}

#[async_trait]
impl HierarchyApi for AzureHierarchy {
    async fn list_members_page(
        &self,
        group_id: &str,
        continuation: Option<&str>,
    ) -> Result<Page<PoolMember>, RemoteApiError> {
        let url = continuation.map_or_else(|| self.group_subscriptions_url(group_id), String::from);

        let response: SubscriptionUnderManagementGroupListResponse = self.get(&url).await?;

        debug!(
            group_id = %group_id,
            count = response.value.len(),
            has_next = response.next_link.is_some(),
            "Fetched subscriptions page"
        );

        Ok(Page {
            items: response.value.into_iter().map(Self::to_member).collect(),
            next: response.next_link,
        })
    }

    async fn list_entities_page(
        &self,
        continuation: Option<&str>,
    ) -> Result<Page<Entity>, RemoteApiError> {
        let url = continuation.map_or_else(|| self.entities_url(), String::from);

        let response: EntityListResponse = self.post::<_, ()>(&url, None).await?;

        debug!(
            count = response.value.len(),
            has_next = response.next_link.is_some(),
            "Fetched entities page"
        );

        Ok(Page {
            items: response.value.into_iter().map(Self::to_entity).collect(),
            next: response.next_link,
        })
    }

    async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<PoolMember, RemoteApiError> {
        let url = self.group_subscription_url(group_id, member_id);
        let sub: SubscriptionUnderManagementGroup = self.get(&url).await?;
        Ok(Self::to_member(sub))
    }

    async fn move_member(
        &self,
        member_id: &str,
        group_id: &str,
    ) -> Result<PoolMember, RemoteApiError> {
        info!(subscription_id = %member_id, group_id = %group_id, "Moving subscription");

        let url = self.group_subscription_url(group_id, member_id);
        let sub: SubscriptionUnderManagementGroup = self.put_empty(&url).await?;

        Ok(Self::to_member(sub))
    }

    async fn rename_member(
        &self,
        member_id: &str,
        new_name: &str,
    ) -> Result<RenamedMember, RemoteApiError> {
        info!(subscription_id = %member_id, new_name = %new_name, "Renaming subscription");

        let body = RenameSubscriptionRequest {
            subscription_name: new_name.to_string(),
        };
        let url = self.rename_url(member_id);
        let renamed: RenamedSubscriptionId = self.post(&url, Some(&body)).await?;

        Ok(RenamedMember {
            id: renamed
                .subscription_id
                .unwrap_or_else(|| member_id.to_string()),
        })
    }
}
