//! Azure management group and subscription API models.

use serde::{Deserialize, Serialize};

/// Resource id prefix of every management group.
pub const MANAGEMENT_GROUP_ID_PREFIX: &str = "/providers/Microsoft.Management/managementGroups/";

/// Entity type reported for subscriptions by the entities API.
pub const SUBSCRIPTION_ENTITY_TYPE: &str = "/subscriptions";

/// Entity type reported for management groups by the entities API.
pub const MANAGEMENT_GROUP_ENTITY_TYPE: &str = "Microsoft.Management/managementGroups";

// ============================================================================
// Subscriptions under a management group
// ============================================================================

/// Subscription membership under a management group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUnderManagementGroup {
    /// Fully qualified membership id.
    pub id: String,
    /// Subscription id.
    pub name: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Properties.
    #[serde(default)]
    pub properties: SubscriptionUnderManagementGroupProperties,
}

/// Properties of a subscription membership.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUnderManagementGroupProperties {
    /// Subscription display name.
    pub display_name: Option<String>,
    /// Parent management group.
    pub parent: Option<DescendantParentGroupInfo>,
    /// Subscription state (e.g. `Active`).
    pub state: Option<String>,
    /// Owning tenant.
    pub tenant: Option<String>,
}

/// Reference to a parent management group.
#[derive(Debug, Clone, Deserialize)]
pub struct DescendantParentGroupInfo {
    /// Fully qualified id of the parent group.
    pub id: Option<String>,
}

/// Paginated list of subscriptions under a management group.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUnderManagementGroupListResponse {
    /// Subscriptions on this page.
    #[serde(default)]
    pub value: Vec<SubscriptionUnderManagementGroup>,
    /// Next link for pagination.
    pub next_link: Option<String>,
}

// ============================================================================
// Entities
// ============================================================================

/// Entity returned by the `getEntities` API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfo {
    /// Fully qualified id.
    pub id: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Entity name (group id or subscription id).
    pub name: String,
    /// Properties.
    #[serde(default)]
    pub properties: EntityInfoProperties,
}

/// Properties of an entity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfoProperties {
    /// Owning tenant.
    pub tenant_id: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Parent management group.
    pub parent: Option<EntityParentGroupInfo>,
}

/// Parent of an entity.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityParentGroupInfo {
    /// Fully qualified id of the parent group.
    pub id: Option<String>,
}

/// Paginated list of entities.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityListResponse {
    /// Entities on this page.
    #[serde(default)]
    pub value: Vec<EntityInfo>,
    /// Next link for pagination.
    pub next_link: Option<String>,
}

// ============================================================================
// Subscription rename
// ============================================================================

/// Body of the subscription rename call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSubscriptionRequest {
    /// New display name.
    pub subscription_name: String,
}

/// Response of the subscription rename call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamedSubscriptionId {
    /// Id of the renamed subscription.
    pub subscription_id: Option<String>,
}

// ============================================================================
// OAuth2
// ============================================================================

/// Token endpoint response for the client credentials grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Token type (`Bearer`).
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<u64>,
}

/// Strip the management group prefix from a fully qualified group id.
#[must_use]
pub fn group_id_from_resource_id(resource_id: &str) -> &str {
    resource_id
        .strip_prefix(MANAGEMENT_GROUP_ID_PREFIX)
        .unwrap_or(resource_id)
}
