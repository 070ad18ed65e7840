//! In-memory storage
//!
//! One `parking_lot::RwLock` per table; no lock is held across an await point.
//! Tables are keyed by `(tenant, id)` so tenants never see each other's rows.

use crate::model::*;
use crate::traits::*;
use async_trait::async_trait;
use hawk_core::{
    ActionId, ControllerId, HawkError, HawkResult, RolloutGroupId, RolloutId,
    SoftwareModuleTypeId, TagId, TenantId,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Write counters, one per kind of statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Rows inserted
    pub creates: u64,
    /// Content updates (each bumps a revision)
    pub updates: u64,
    /// `touch_last_query` statements executed
    pub touches: u64,
    /// Rows changed by those statements
    pub touched_rows: u64,
    /// Rows removed
    pub deletes: u64,
}

#[derive(Debug, Default)]
struct Faults {
    failing_touches: usize,
    touch_latency: Option<Duration>,
}

type Table<K, V> = RwLock<BTreeMap<(TenantId, K), V>>;

/// Store keeping every table in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    targets: Table<ControllerId, Target>,
    tags: Table<TagId, Tag>,
    module_types: Table<SoftwareModuleTypeId, SoftwareModuleType>,
    rollout_groups: Table<RolloutGroupId, RolloutGroup>,
    actions: Table<ActionId, Action>,
    sequence: AtomicU64,
    stats: Mutex<StoreStats>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the write counters
    pub fn stats(&self) -> StoreStats {
        *self.stats.lock()
    }

    /// Make the next `count` touch statements fail with a storage error
    pub fn fail_next_touches(&self, count: usize) {
        self.faults.lock().failing_touches = count;
    }

    /// Delay every touch statement, to exercise flush timeouts
    pub fn set_touch_latency(&self, latency: Option<Duration>) {
        self.faults.lock().touch_latency = latency;
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, update: impl FnOnce(&mut StoreStats)) {
        update(&mut self.stats.lock());
    }
}

fn check_revision(entity: impl Into<String>, expected: u64, actual: u64) -> HawkResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HawkError::optimistic_lock(entity, expected, actual))
    }
}

fn of_tenant<'a, K: Ord + 'a, V: Clone + 'a>(
    rows: impl Iterator<Item = (&'a (TenantId, K), &'a V)>,
    tenant: &TenantId,
) -> Vec<V> {
    rows.filter(|((owner, _), _)| owner == tenant)
        .map(|(_, row)| row.clone())
        .collect()
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn get_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<Option<Target>> {
        Ok(self
            .targets
            .read()
            .get(&(tenant.clone(), controller_id.clone()))
            .cloned())
    }

    async fn list_targets(&self, tenant: &TenantId) -> HawkResult<Vec<Target>> {
        Ok(of_tenant(self.targets.read().iter(), tenant))
    }

    async fn count_targets(&self, tenant: &TenantId) -> HawkResult<usize> {
        Ok(self
            .targets
            .read()
            .keys()
            .filter(|(owner, _)| owner == tenant)
            .count())
    }

    async fn create_target(
        &self,
        tenant: &TenantId,
        target: NewTarget,
        now: u64,
    ) -> HawkResult<Target> {
        let key = (tenant.clone(), target.controller_id.clone());
        let mut targets = self.targets.write();
        if targets.contains_key(&key) {
            return Err(HawkError::already_exists(format!(
                "target {}",
                target.controller_id
            )));
        }

        let created = Target {
            tenant: tenant.clone(),
            name: target
                .name
                .unwrap_or_else(|| target.controller_id.to_string()),
            controller_id: target.controller_id,
            description: target.description,
            address: target.address,
            target_type: target.target_type,
            update_status: target.update_status,
            attributes: BTreeMap::new(),
            tags: BTreeSet::new(),
            security_token: target.security_token,
            auto_confirmation: None,
            last_target_query: target.last_target_query,
            created_at: now,
            revision: 1,
        };
        targets.insert(key, created.clone());
        drop(targets);

        self.record(|stats| stats.creates += 1);
        Ok(created)
    }

    async fn update_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        expected_revision: u64,
        update: TargetUpdate,
    ) -> HawkResult<Target> {
        let mut targets = self.targets.write();
        let target = targets
            .get_mut(&(tenant.clone(), controller_id.clone()))
            .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;
        check_revision(
            format!("target {controller_id}"),
            expected_revision,
            target.revision,
        )?;

        update.apply(target);
        target.revision += 1;
        let updated = target.clone();
        drop(targets);

        self.record(|stats| stats.updates += 1);
        Ok(updated)
    }

    async fn touch_last_query(
        &self,
        tenant: &TenantId,
        entries: &[(ControllerId, u64)],
    ) -> HawkResult<usize> {
        let latency = {
            let mut faults = self.faults.lock();
            if faults.failing_touches > 0 {
                faults.failing_touches -= 1;
                tracing::debug!(%tenant, entries = entries.len(), "failing touch on request");
                return Err(HawkError::storage("injected touch failure"));
            }
            faults.touch_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut touched = 0;
        {
            let mut targets = self.targets.write();
            for (controller_id, polled_at) in entries {
                if let Some(target) = targets.get_mut(&(tenant.clone(), controller_id.clone())) {
                    target.last_target_query = target.last_target_query.max(Some(*polled_at));
                    touched += 1;
                }
            }
        }

        self.record(|stats| {
            stats.touches += 1;
            stats.touched_rows += touched as u64;
        });
        tracing::trace!(%tenant, entries = entries.len(), touched, "last query touched");
        Ok(touched)
    }

    async fn delete_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<()> {
        self.targets
            .write()
            .remove(&(tenant.clone(), controller_id.clone()))
            .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;
        self.record(|stats| stats.deletes += 1);
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn create_tag(&self, tenant: &TenantId, tag: NewTag) -> HawkResult<Tag> {
        let mut tags = self.tags.write();
        let duplicate = tags.iter().any(|((owner, _), existing)| {
            owner == tenant && existing.kind == tag.kind && existing.name == tag.name
        });
        if duplicate {
            return Err(HawkError::already_exists(format!("tag '{}'", tag.name)));
        }

        let id = TagId(self.next_id());
        let created = Tag {
            id,
            tenant: tenant.clone(),
            kind: tag.kind,
            name: tag.name,
            description: tag.description,
            colour: tag.colour,
            revision: 1,
        };
        tags.insert((tenant.clone(), id), created.clone());
        drop(tags);

        self.record(|stats| stats.creates += 1);
        Ok(created)
    }

    async fn get_tag(
        &self,
        tenant: &TenantId,
        kind: TagKind,
        id: TagId,
    ) -> HawkResult<Option<Tag>> {
        Ok(self
            .tags
            .read()
            .get(&(tenant.clone(), id))
            .filter(|tag| tag.kind == kind)
            .cloned())
    }

    async fn find_tag_by_name(
        &self,
        tenant: &TenantId,
        kind: TagKind,
        name: &str,
    ) -> HawkResult<Option<Tag>> {
        Ok(self
            .tags
            .read()
            .iter()
            .find(|((owner, _), tag)| owner == tenant && tag.kind == kind && tag.name == name)
            .map(|(_, tag)| tag.clone()))
    }

    async fn list_tags(&self, tenant: &TenantId, kind: TagKind) -> HawkResult<Vec<Tag>> {
        let mut tags = of_tenant(self.tags.read().iter(), tenant);
        tags.retain(|tag| tag.kind == kind);
        Ok(tags)
    }

    async fn update_tag(
        &self,
        tenant: &TenantId,
        kind: TagKind,
        id: TagId,
        expected_revision: u64,
        update: TagUpdate,
    ) -> HawkResult<Tag> {
        let mut tags = self.tags.write();
        if let Some(name) = &update.name {
            let clash = tags.iter().any(|((owner, other), tag)| {
                owner == tenant && *other != id && tag.kind == kind && &tag.name == name
            });
            if clash {
                return Err(HawkError::already_exists(format!("tag '{name}'")));
            }
        }

        let tag = tags
            .get_mut(&(tenant.clone(), id))
            .filter(|tag| tag.kind == kind)
            .ok_or_else(|| HawkError::not_found(format!("{id}")))?;
        check_revision(id.to_string(), expected_revision, tag.revision)?;

        if let Some(name) = update.name {
            tag.name = name;
        }
        if let Some(description) = update.description {
            tag.description = Some(description);
        }
        if let Some(colour) = update.colour {
            tag.colour = Some(colour);
        }
        tag.revision += 1;
        let updated = tag.clone();
        drop(tags);

        self.record(|stats| stats.updates += 1);
        Ok(updated)
    }

    async fn delete_tag(&self, tenant: &TenantId, kind: TagKind, id: TagId) -> HawkResult<()> {
        {
            let mut tags = self.tags.write();
            let key = (tenant.clone(), id);
            if !tags.get(&key).is_some_and(|tag| tag.kind == kind) {
                return Err(HawkError::not_found(format!("{id}")));
            }
            tags.remove(&key);
        }

        // Join rows only; target revisions are untouched
        if kind == TagKind::Target {
            for ((owner, _), target) in self.targets.write().iter_mut() {
                if owner == tenant {
                    target.tags.remove(&id);
                }
            }
        }

        self.record(|stats| stats.deletes += 1);
        Ok(())
    }
}

#[async_trait]
impl SoftwareModuleTypeStore for MemoryStore {
    async fn create_module_type(
        &self,
        tenant: &TenantId,
        module_type: NewSoftwareModuleType,
    ) -> HawkResult<SoftwareModuleType> {
        let mut types = self.module_types.write();
        let duplicate = types.iter().any(|((owner, _), existing)| {
            owner == tenant && (existing.key == module_type.key || existing.name == module_type.name)
        });
        if duplicate {
            return Err(HawkError::already_exists(format!(
                "software module type '{}'",
                module_type.key
            )));
        }

        let id = SoftwareModuleTypeId(self.next_id());
        let created = SoftwareModuleType {
            id,
            tenant: tenant.clone(),
            key: module_type.key,
            name: module_type.name,
            description: module_type.description,
            colour: module_type.colour,
            max_assignments: module_type.max_assignments,
            revision: 1,
        };
        types.insert((tenant.clone(), id), created.clone());
        drop(types);

        self.record(|stats| stats.creates += 1);
        Ok(created)
    }

    async fn get_module_type(
        &self,
        tenant: &TenantId,
        id: SoftwareModuleTypeId,
    ) -> HawkResult<Option<SoftwareModuleType>> {
        Ok(self.module_types.read().get(&(tenant.clone(), id)).cloned())
    }

    async fn list_module_types(&self, tenant: &TenantId) -> HawkResult<Vec<SoftwareModuleType>> {
        Ok(of_tenant(self.module_types.read().iter(), tenant))
    }

    async fn update_module_type(
        &self,
        tenant: &TenantId,
        id: SoftwareModuleTypeId,
        expected_revision: u64,
        update: SoftwareModuleTypeUpdate,
    ) -> HawkResult<SoftwareModuleType> {
        let mut types = self.module_types.write();
        let module_type = types
            .get_mut(&(tenant.clone(), id))
            .ok_or_else(|| HawkError::not_found(format!("{id}")))?;
        check_revision(id.to_string(), expected_revision, module_type.revision)?;

        if let Some(description) = update.description {
            module_type.description = Some(description);
        }
        if let Some(colour) = update.colour {
            module_type.colour = Some(colour);
        }
        module_type.revision += 1;
        let updated = module_type.clone();
        drop(types);

        self.record(|stats| stats.updates += 1);
        Ok(updated)
    }

    async fn delete_module_type(
        &self,
        tenant: &TenantId,
        id: SoftwareModuleTypeId,
    ) -> HawkResult<()> {
        self.module_types
            .write()
            .remove(&(tenant.clone(), id))
            .ok_or_else(|| HawkError::not_found(format!("{id}")))?;
        self.record(|stats| stats.deletes += 1);
        Ok(())
    }
}

#[async_trait]
impl RolloutGroupStore for MemoryStore {
    async fn create_rollout_group(
        &self,
        tenant: &TenantId,
        group: NewRolloutGroup,
    ) -> HawkResult<RolloutGroup> {
        let id = RolloutGroupId(self.next_id());
        let created = RolloutGroup {
            id,
            tenant: tenant.clone(),
            rollout: group.rollout,
            name: group.name,
            description: group.description,
            status: group.status,
            targets: group.targets,
        };
        self.rollout_groups
            .write()
            .insert((tenant.clone(), id), created.clone());

        self.record(|stats| stats.creates += 1);
        Ok(created)
    }

    async fn get_rollout_group(
        &self,
        tenant: &TenantId,
        id: RolloutGroupId,
    ) -> HawkResult<Option<RolloutGroup>> {
        Ok(self.rollout_groups.read().get(&(tenant.clone(), id)).cloned())
    }

    async fn list_rollout_groups(
        &self,
        tenant: &TenantId,
        rollout: RolloutId,
    ) -> HawkResult<Vec<RolloutGroup>> {
        let mut groups = of_tenant(self.rollout_groups.read().iter(), tenant);
        groups.retain(|group| group.rollout == rollout);
        Ok(groups)
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn create_action(
        &self,
        tenant: &TenantId,
        action: NewAction,
        now: u64,
    ) -> HawkResult<Action> {
        let id = ActionId(self.next_id());
        let created = Action {
            id,
            tenant: tenant.clone(),
            controller_id: action.controller_id,
            distribution_set: action.distribution_set,
            status: action.status,
            messages: Vec::new(),
            created_at: now,
            revision: 1,
        };
        self.actions
            .write()
            .insert((tenant.clone(), id), created.clone());

        self.record(|stats| stats.creates += 1);
        Ok(created)
    }

    async fn get_action(&self, tenant: &TenantId, id: ActionId) -> HawkResult<Option<Action>> {
        Ok(self.actions.read().get(&(tenant.clone(), id)).cloned())
    }

    async fn list_actions(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<Vec<Action>> {
        let mut actions = of_tenant(self.actions.read().iter(), tenant);
        actions.retain(|action| &action.controller_id == controller_id);
        Ok(actions)
    }

    async fn count_actions(&self, tenant: &TenantId) -> HawkResult<usize> {
        Ok(self
            .actions
            .read()
            .keys()
            .filter(|(owner, _)| owner == tenant)
            .count())
    }

    async fn update_action(
        &self,
        tenant: &TenantId,
        id: ActionId,
        expected_revision: u64,
        update: ActionUpdate,
    ) -> HawkResult<Action> {
        let mut actions = self.actions.write();
        let action = actions
            .get_mut(&(tenant.clone(), id))
            .ok_or_else(|| HawkError::not_found(format!("{id}")))?;
        check_revision(id.to_string(), expected_revision, action.revision)?;

        if let Some(status) = update.status {
            action.status = status;
        }
        if let Some(message) = update.message {
            action.messages.push(message);
        }
        action.revision += 1;
        let updated = action.clone();
        drop(actions);

        self.record(|stats| stats.updates += 1);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn device(id: &str) -> ControllerId {
        ControllerId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_touch_is_metadata_only_and_monotonic() {
        let store = MemoryStore::new();
        store
            .create_target(&tenant(), NewTarget::new(device("d1"), "t"), 10)
            .await
            .unwrap();

        let touched = store
            .touch_last_query(&tenant(), &[(device("d1"), 500), (device("ghost"), 500)])
            .await
            .unwrap();
        assert_eq!(touched, 1);
        store
            .touch_last_query(&tenant(), &[(device("d1"), 300)])
            .await
            .unwrap();

        let target = store.get_target(&tenant(), &device("d1")).await.unwrap().unwrap();
        assert_eq!(target.revision, 1);
        assert_eq!(target.last_target_query, Some(500));
        assert_eq!(store.stats().touches, 2);
        assert_eq!(store.stats().updates, 0);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = MemoryStore::new();
        store
            .create_target(&tenant(), NewTarget::new(device("d1"), "t"), 10)
            .await
            .unwrap();
        let other = TenantId::new("other");
        assert!(store.get_target(&other, &device("d1")).await.unwrap().is_none());
        assert_eq!(store.count_targets(&other).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_injected_touch_failure_is_consumed() {
        let store = MemoryStore::new();
        store.fail_next_touches(1);
        assert!(store.touch_last_query(&tenant(), &[]).await.is_err());
        assert!(store.touch_last_query(&tenant(), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleting_target_tag_detaches_it() {
        let store = MemoryStore::new();
        let tag = store
            .create_tag(
                &tenant(),
                NewTag {
                    kind: TagKind::Target,
                    name: "lab".into(),
                    description: None,
                    colour: None,
                },
            )
            .await
            .unwrap();
        let target = store
            .create_target(&tenant(), NewTarget::new(device("d1"), "t"), 10)
            .await
            .unwrap();
        store
            .update_target(
                &tenant(),
                &device("d1"),
                target.revision,
                TargetUpdate {
                    tags: Some([tag.id].into()),
                    ..TargetUpdate::default()
                },
            )
            .await
            .unwrap();

        store.delete_tag(&tenant(), TagKind::Target, tag.id).await.unwrap();

        let target = store.get_target(&tenant(), &device("d1")).await.unwrap().unwrap();
        assert!(target.tags.is_empty());
        assert_eq!(target.revision, 2);
    }
}
