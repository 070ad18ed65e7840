//! Revision handling of the in-memory store

use assert_matches::assert_matches;
use hawk_core::{ControllerId, HawkError, TenantId};
use hawk_store::*;

fn tenant() -> TenantId {
    TenantId::new("acme")
}

fn device() -> ControllerId {
    ControllerId::new("device-1").unwrap()
}

#[tokio::test]
async fn stale_revision_fails_distinctly_from_missing_entity() {
    let store = MemoryStore::new();
    let created = store
        .create_target(&tenant(), NewTarget::new(device(), "secret"), 1_000)
        .await
        .unwrap();
    assert_eq!(created.revision, 1);

    let rename = || TargetUpdate {
        name: Some("renamed".to_string()),
        ..TargetUpdate::default()
    };
    let updated = store
        .update_target(&tenant(), &device(), 1, rename())
        .await
        .unwrap();
    assert_eq!(updated.revision, 2);

    let stale = store.update_target(&tenant(), &device(), 1, rename()).await;
    assert_matches!(
        stale,
        Err(HawkError::OptimisticLock {
            expected: 1,
            actual: 2,
            ..
        })
    );

    let missing = store
        .update_target(
            &tenant(),
            &ControllerId::new("device-2").unwrap(),
            1,
            rename(),
        )
        .await;
    assert_matches!(missing, Err(HawkError::NotFound { .. }));
}

#[tokio::test]
async fn poll_touch_does_not_collide_with_content_update() {
    let store = MemoryStore::new();
    let created = store
        .create_target(&tenant(), NewTarget::new(device(), "secret"), 1_000)
        .await
        .unwrap();

    store
        .touch_last_query(&tenant(), &[(device(), 2_000)])
        .await
        .unwrap();

    // The revision read before the touch is still current
    let updated = store
        .update_target(
            &tenant(),
            &device(),
            created.revision,
            TargetUpdate {
                description: Some("lab bench".to_string()),
                ..TargetUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.revision, created.revision + 1);
    assert_eq!(updated.last_target_query, Some(2_000));
}

#[tokio::test]
async fn duplicates_are_rejected() {
    let store = MemoryStore::new();
    store
        .create_target(&tenant(), NewTarget::new(device(), "a"), 1)
        .await
        .unwrap();
    assert_matches!(
        store
            .create_target(&tenant(), NewTarget::new(device(), "b"), 2)
            .await,
        Err(HawkError::AlreadyExists { .. })
    );

    let new_type = || NewSoftwareModuleType {
        key: "os".to_string(),
        name: "Operating System".to_string(),
        description: None,
        colour: None,
        max_assignments: 1,
    };
    store.create_module_type(&tenant(), new_type()).await.unwrap();
    assert_matches!(
        store.create_module_type(&tenant(), new_type()).await,
        Err(HawkError::AlreadyExists { .. })
    );
    assert_eq!(store.stats().creates, 2);
}

#[tokio::test]
async fn tag_kinds_do_not_mix() {
    let store = MemoryStore::new();
    let tag = store
        .create_tag(
            &tenant(),
            NewTag {
                kind: TagKind::DistributionSet,
                name: "stable".to_string(),
                description: None,
                colour: None,
            },
        )
        .await
        .unwrap();

    assert!(store
        .get_tag(&tenant(), TagKind::Target, tag.id)
        .await
        .unwrap()
        .is_none());
    assert_matches!(
        store.delete_tag(&tenant(), TagKind::Target, tag.id).await,
        Err(HawkError::NotFound { .. })
    );
    store
        .delete_tag(&tenant(), TagKind::DistributionSet, tag.id)
        .await
        .unwrap();
    assert!(store
        .find_tag_by_name(&tenant(), TagKind::DistributionSet, "stable")
        .await
        .unwrap()
        .is_none());
}
