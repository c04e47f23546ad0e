//! Management hierarchy abstractions.
//!
//! This module defines the remote facade the pool and lease logic talk to,
//! and the Azure implementation of it.

pub mod azure;
mod traits;

pub use traits::{
    hierarchy_entities, members_under_group, Entity, EntityKind, HierarchyApi, Page, PoolMember,
    RemoteApiError, RenamedMember,
};

// Re-export provider clients
pub use azure::AzureHierarchy;
