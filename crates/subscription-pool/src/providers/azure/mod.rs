//! Azure management group hierarchy.
//!
//! Implements the [`HierarchyApi`](crate::providers::HierarchyApi) trait on top
//! of Azure Resource Manager.
//!
//! ## Services
//!
//! - **Management Groups** (`2021-04-01`) - entity listing, group membership
//! - **Subscription** (`2021-10-01`) - subscription rename
//! - **Microsoft identity platform** - client credentials token

mod auth;
mod client;
mod models;

pub use auth::{AccessToken, ClientSecretCredential};
pub use client::AzureHierarchy;
pub use models::*;
