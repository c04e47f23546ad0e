//! Subscription pool leasing for Azure management groups.
//!
//! A fixed set of pre-provisioned subscriptions sits in a pool management
//! group. This crate hands them out one at a time to consumers, moves each
//! leased subscription into the consumer's management group, renames it, and
//! returns it to the pool group on release.
//!
//! - [`pool::Pool`] - one-shot scan of the pool group into a sealed queue
//! - [`lease::LeaseController`] - create/read/update/delete of a lease
//! - [`providers::HierarchyApi`] - the remote management hierarchy
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use subscription_pool::lease::{LeaseController, LeaseSpec};
//! use subscription_pool::pool::Pool;
//! use subscription_pool::providers::azure::{AzureHierarchy, ClientSecretCredential};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let token = ClientSecretCredential::new("tenant", "client", "secret")?
//!         .get_token()
//!         .await?;
//!     let api = Arc::new(AzureHierarchy::new(token)?);
//!     let pool = Arc::new(Pool::scan(api.as_ref(), "Crossnative", "Pool_").await?);
//!
//!     let leases = LeaseController::new(api, pool);
//!     let record = leases.create(&LeaseSpec::new("cn-sandbox", "team-a")).await?;
//!     println!("leased {}", record.subscription_id);
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod lease;
pub mod pool;
pub mod providers;
pub mod state;

pub use config::{PoolConfig, PoolConfigOverrides};
pub use error::PoolError;
pub use lease::{truncate, LeaseController, LeaseRecord, LeaseSpec};
pub use pool::{AllocationQueue, Pool};
pub use providers::{
    AzureHierarchy, Entity, EntityKind, HierarchyApi, Page, PoolMember, RemoteApiError,
    RenamedMember,
};
pub use state::LeaseState;
