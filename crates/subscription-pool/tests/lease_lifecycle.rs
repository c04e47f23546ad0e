//! Lease lifecycle tests against an in-memory management hierarchy.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use subscription_pool::{
    Entity, EntityKind, HierarchyApi, LeaseController, LeaseRecord, LeaseSpec, Page, Pool,
    PoolError, PoolMember, RemoteApiError, RenamedMember,
};

// =============================================================================
// In-memory hierarchy
// =============================================================================

const POOL_GROUP: &str = "pool";
const POOL_PREFIX: &str = "Pool_";
const PAGE_SIZE: usize = 2;

/// Mutating call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Move { id: String, group: String },
    Rename { id: String, name: String },
}

#[derive(Debug, Clone)]
struct Subscription {
    group: String,
    name: String,
}

/// Management hierarchy kept in memory, paging listings two items at a time.
#[derive(Default)]
struct FakeHierarchy {
    subscriptions: Mutex<BTreeMap<String, Subscription>>,
    calls: Mutex<Vec<Call>>,
    fail_moves: AtomicBool,
    fail_renames: AtomicBool,
}

impl FakeHierarchy {
    fn seeded() -> Self {
        let fake = Self::default();
        fake.insert("sub-a", POOL_GROUP, "Pool_A");
        fake.insert("sub-b", POOL_GROUP, "Pool_B");
        fake.insert("sub-c", POOL_GROUP, "Pool_C");
        fake.insert("sub-x", POOL_GROUP, "Unrelated");
        fake.insert("sub-123", "cn-sandbox", "team-x");
        fake
    }

    fn insert(&self, id: &str, group: &str, name: &str) {
        self.subscriptions.lock().unwrap().insert(
            id.to_string(),
            Subscription {
                group: group.to_string(),
                name: name.to_string(),
            },
        );
    }

    fn subscription(&self, id: &str) -> Subscription {
        self.subscriptions.lock().unwrap()[id].clone()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn member(id: &str, sub: &Subscription) -> PoolMember {
        PoolMember {
            id: id.to_string(),
            display_name: sub.name.clone(),
            fully_qualified_id: format!(
                "/providers/Microsoft.Management/managementGroups/{}/subscriptions/{id}",
                sub.group
            ),
            parent_group_id: Some(sub.group.clone()),
        }
    }

    fn page<T>(items: Vec<T>, continuation: Option<&str>) -> Page<T> {
        let start: usize = continuation.map_or(0, |c| c.parse().unwrap());
        let end = (start + PAGE_SIZE).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Page {
            items: items.into_iter().skip(start).take(end - start).collect(),
            next,
        }
    }

    fn injected_failure() -> RemoteApiError {
        RemoteApiError::Api {
            status: 500,
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl HierarchyApi for FakeHierarchy {
    async fn list_members_page(
        &self,
        group_id: &str,
        continuation: Option<&str>,
    ) -> Result<Page<PoolMember>, RemoteApiError> {
        let members: Vec<PoolMember> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, sub)| sub.group == group_id)
            .map(|(id, sub)| Self::member(id, sub))
            .collect();
        Ok(Self::page(members, continuation))
    }

    async fn list_entities_page(
        &self,
        continuation: Option<&str>,
    ) -> Result<Page<Entity>, RemoteApiError> {
        let mut entities = vec![Entity {
            kind: EntityKind::ManagementGroup,
            name: POOL_GROUP.to_string(),
            id: format!("/providers/Microsoft.Management/managementGroups/{POOL_GROUP}"),
            display_name: "Pool".to_string(),
            parent_group_id: None,
        }];
        entities.extend(self.subscriptions.lock().unwrap().iter().map(|(id, sub)| {
            Entity {
                kind: EntityKind::Subscription,
                name: id.clone(),
                id: format!("/subscriptions/{id}"),
                display_name: sub.name.clone(),
                parent_group_id: Some(sub.group.clone()),
            }
        }));
        Ok(Self::page(entities, continuation))
    }

    async fn move_member(
        &self,
        member_id: &str,
        group_id: &str,
    ) -> Result<PoolMember, RemoteApiError> {
        self.calls.lock().unwrap().push(Call::Move {
            id: member_id.to_string(),
            group: group_id.to_string(),
        });
        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let mut subscriptions = self.subscriptions.lock().unwrap();
        let sub = subscriptions
            .get_mut(member_id)
            .ok_or_else(|| RemoteApiError::NotFound(member_id.to_string()))?;
        sub.group = group_id.to_string();
        Ok(Self::member(member_id, sub))
    }

    async fn rename_member(
        &self,
        member_id: &str,
        new_name: &str,
    ) -> Result<RenamedMember, RemoteApiError> {
        self.calls.lock().unwrap().push(Call::Rename {
            id: member_id.to_string(),
            name: new_name.to_string(),
        });
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let mut subscriptions = self.subscriptions.lock().unwrap();
        let sub = subscriptions
            .get_mut(member_id)
            .ok_or_else(|| RemoteApiError::NotFound(member_id.to_string()))?;
        sub.name = new_name.to_string();
        Ok(RenamedMember {
            id: member_id.to_string(),
        })
    }
}

async fn setup() -> (Arc<FakeHierarchy>, LeaseController<FakeHierarchy>) {
    let api = Arc::new(FakeHierarchy::seeded());
    let pool = Pool::scan(api.as_ref(), POOL_GROUP, POOL_PREFIX)
        .await
        .unwrap();
    let leases = LeaseController::new(Arc::clone(&api), Arc::new(pool));
    (api, leases)
}

// =============================================================================
// Pool scan and allocation
// =============================================================================

#[tokio::test]
async fn test_scan_keeps_only_prefixed_members() {
    let (_, leases) = setup().await;
    assert_eq!(leases.pool().capacity(), 3);
    assert_eq!(leases.pool().remaining(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_subscriptions() {
    let (api, leases) = setup().await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let leases = leases.clone();
            tokio::spawn(async move {
                leases
                    .create(&LeaseSpec::new("cn-sandbox", format!("team-{i}")))
                    .await
            })
        })
        .collect();

    let mut leased = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => leased.push(record),
            Err(PoolError::PoolExhausted { .. }) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(leased.len(), 3);
    assert_eq!(exhausted, 1);

    let ids: HashSet<&str> = leased.iter().map(|r| r.subscription_id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["sub-a", "sub-b", "sub-c"]));

    for record in &leased {
        let sub = api.subscription(&record.subscription_id);
        assert_eq!(sub.group, "cn-sandbox");
        assert_eq!(sub.name, record.target_name);
        assert_eq!(record.actual_parent_group_id, record.target_group_id);
    }
}

#[tokio::test]
async fn test_create_moves_before_renaming() {
    let (api, leases) = setup().await;

    let record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();

    assert_eq!(record.subscription_id, "sub-a");
    assert_eq!(
        api.calls(),
        vec![
            Call::Move {
                id: "sub-a".to_string(),
                group: "cn-sandbox".to_string(),
            },
            Call::Rename {
                id: "sub-a".to_string(),
                name: "team-a".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_failed_move_consumes_the_allocation() {
    let (api, leases) = setup().await;

    api.fail_moves.store(true, Ordering::SeqCst);
    let err = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Remote { .. }));
    assert_eq!(leases.pool().remaining(), 2);
    assert_eq!(api.subscription("sub-a").group, POOL_GROUP);

    api.fail_moves.store(false, Ordering::SeqCst);
    let record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    assert_eq!(record.subscription_id, "sub-b");
}

#[tokio::test]
async fn test_failed_rename_leaves_subscription_moved() {
    let (api, leases) = setup().await;

    api.fail_renames.store(true, Ordering::SeqCst);
    let err = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Remote { .. }));
    let sub = api.subscription("sub-a");
    assert_eq!(sub.group, "cn-sandbox");
    assert_eq!(sub.name, "Pool_A");
}

// =============================================================================
// Read and import
// =============================================================================

#[tokio::test]
async fn test_create_then_read_round_trip() {
    let (_, leases) = setup().await;

    let created = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    let read = leases.read(&created.subscription_id).await.unwrap();

    assert_eq!(read, created);
    assert_eq!(read.fully_qualified_id, "/subscriptions/sub-a");
}

#[tokio::test]
async fn test_read_adopts_external_changes() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.insert("sub-a", "cn-prod", "renamed-by-hand");

    leases.refresh(&mut record).await.unwrap();

    assert_eq!(record.actual_parent_group_id, "cn-prod");
    assert_eq!(record.target_name, "renamed-by-hand");
    assert_eq!(record.target_group_id, "cn-sandbox");
}

#[tokio::test]
async fn test_read_missing_subscription_is_broken_state() {
    let (_, leases) = setup().await;

    match leases.read("does-not-exist").await {
        Err(PoolError::BrokenState {
            subscription_id,
            group_id,
        }) => {
            assert_eq!(subscription_id, "does-not-exist");
            assert!(group_id.is_none());
        }
        other => panic!("expected broken state, got {other:?}"),
    }
}

#[tokio::test]
async fn test_import_existing_subscription() {
    let (api, leases) = setup().await;

    let record = leases.import("sub-123").await.unwrap();

    assert_eq!(
        record,
        LeaseRecord {
            subscription_id: "sub-123".to_string(),
            fully_qualified_id: "/subscriptions/sub-123".to_string(),
            target_group_id: "cn-sandbox".to_string(),
            target_name: "team-x".to_string(),
            actual_parent_group_id: "cn-sandbox".to_string(),
        }
    );
    assert!(api.calls().is_empty());
    assert_eq!(leases.pool().remaining(), 3);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_without_changes_issues_no_calls() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.clear_calls();

    let desired = record.spec();
    leases.update(&mut record, &desired).await.unwrap();

    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_update_group_only_moves_without_renaming() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.clear_calls();

    leases
        .update(&mut record, &LeaseSpec::new("cn-prod", "team-a"))
        .await
        .unwrap();

    assert_eq!(
        api.calls(),
        vec![Call::Move {
            id: "sub-a".to_string(),
            group: "cn-prod".to_string(),
        }]
    );
    assert_eq!(record.actual_parent_group_id, "cn-prod");
    assert_eq!(record.target_group_id, "cn-prod");
}

#[tokio::test]
async fn test_update_name_only_renames_without_moving() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.clear_calls();

    leases
        .update(&mut record, &LeaseSpec::new("cn-sandbox", "team-b"))
        .await
        .unwrap();

    assert_eq!(
        api.calls(),
        vec![Call::Rename {
            id: "sub-a".to_string(),
            name: "team-b".to_string(),
        }]
    );
    assert_eq!(record.target_name, "team-b");
    assert_eq!(api.subscription("sub-a").name, "team-b");
}

#[tokio::test]
async fn test_update_outside_tracked_group_is_broken_state() {
    let (_, leases) = setup().await;

    let mut record = leases.import("sub-123").await.unwrap();
    record.actual_parent_group_id = "elsewhere".to_string();

    match leases
        .update(&mut record, &LeaseSpec::new("cn-prod", "team-x"))
        .await
    {
        Err(PoolError::BrokenState {
            subscription_id,
            group_id,
        }) => {
            assert_eq!(subscription_id, "sub-123");
            assert_eq!(group_id.as_deref(), Some("elsewhere"));
        }
        other => panic!("expected broken state, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_move_failure_stops_before_rename() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.clear_calls();
    api.fail_moves.store(true, Ordering::SeqCst);

    let err = leases
        .update(&mut record, &LeaseSpec::new("cn-prod", "team-b"))
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Remote { .. }));
    assert_eq!(record.actual_parent_group_id, "cn-sandbox");
    assert_eq!(record.target_name, "team-a");
    assert_eq!(
        api.calls(),
        vec![Call::Move {
            id: "sub-a".to_string(),
            group: "cn-prod".to_string(),
        }]
    );
    let sub = api.subscription("sub-a");
    assert_eq!(sub.group, "cn-sandbox");
    assert_eq!(sub.name, "team-a");
}

#[tokio::test]
async fn test_update_partial_failure_records_completed_move() {
    let (api, leases) = setup().await;

    let mut record = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-a"))
        .await
        .unwrap();
    api.fail_renames.store(true, Ordering::SeqCst);

    let err = leases
        .update(&mut record, &LeaseSpec::new("cn-prod", "team-b"))
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Remote { .. }));
    assert_eq!(record.actual_parent_group_id, "cn-prod");
    assert_eq!(record.target_name, "team-a");
    assert_eq!(api.subscription("sub-a").group, "cn-prod");
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_returns_subscription_to_pool() {
    let (api, leases) = setup().await;

    let record = leases.import("sub-123").await.unwrap();
    leases.delete(&record).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            Call::Move {
                id: "sub-123".to_string(),
                group: POOL_GROUP.to_string(),
            },
            Call::Rename {
                id: "sub-123".to_string(),
                name: "Pool_sub-123".to_string(),
            },
        ]
    );
    let sub = api.subscription("sub-123");
    assert_eq!(sub.group, POOL_GROUP);
    assert_eq!(sub.name, "Pool_sub-123");
}

#[tokio::test]
async fn test_delete_move_failure_skips_rename() {
    let (api, leases) = setup().await;

    let record = leases.import("sub-123").await.unwrap();
    api.fail_moves.store(true, Ordering::SeqCst);

    let err = leases.delete(&record).await.unwrap_err();

    assert!(matches!(err, PoolError::Remote { .. }));
    assert_eq!(
        api.calls(),
        vec![Call::Move {
            id: "sub-123".to_string(),
            group: POOL_GROUP.to_string(),
        }]
    );
    let sub = api.subscription("sub-123");
    assert_eq!(sub.group, "cn-sandbox");
    assert_eq!(sub.name, "team-x");
}

#[tokio::test]
async fn test_delete_rename_failure_leaves_subscription_in_pool_group() {
    let (api, leases) = setup().await;

    let record = leases.import("sub-123").await.unwrap();
    api.fail_renames.store(true, Ordering::SeqCst);

    let err = leases.delete(&record).await.unwrap_err();

    assert!(matches!(err, PoolError::Remote { .. }));
    assert_eq!(api.calls().len(), 2);
    let sub = api.subscription("sub-123");
    assert_eq!(sub.group, POOL_GROUP);
    assert_eq!(sub.name, "team-x");
}

#[tokio::test]
async fn test_released_subscription_is_not_reallocated() {
    let (_, leases) = setup().await;

    let mut records = Vec::new();
    for i in 0..3 {
        records.push(
            leases
                .create(&LeaseSpec::new("cn-sandbox", format!("team-{i}")))
                .await
                .unwrap(),
        );
    }
    leases.delete(&records[0]).await.unwrap();

    let err = leases
        .create(&LeaseSpec::new("cn-sandbox", "team-again"))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::PoolExhausted { .. }));
}
