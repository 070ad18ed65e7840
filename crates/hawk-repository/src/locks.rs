//! Per-entity write serialization
//!
//! A fixed array of async mutex stripes. A target maps to one stripe by hash of
//! `(tenant, controller id)`; every write to a target holds its stripe, so a
//! content update and a coalesced flush of the same target never interleave
//! while writes to targets on other stripes proceed in parallel.
//!
//! Holders of several stripes take them in ascending index order.

use hawk_core::{ControllerId, TenantId};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Striped per-target locks
#[derive(Debug)]
pub struct EntityLocks {
    stripes: Vec<Mutex<()>>,
}

impl EntityLocks {
    /// Create `stripes` locks (at least one)
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes
    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index guarding a target
    pub fn stripe_of(&self, tenant: &TenantId, controller_id: &ControllerId) -> usize {
        let mut hasher = DefaultHasher::new();
        tenant.hash(&mut hasher);
        controller_id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Hold the stripe of one target
    pub async fn lock(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(tenant, controller_id)].lock().await
    }

    /// Hold the stripes of several targets, each stripe once, in index order
    pub async fn lock_all<'a, I>(
        &self,
        tenant: &TenantId,
        controller_ids: I,
    ) -> Vec<MutexGuard<'_, ()>>
    where
        I: IntoIterator<Item = &'a ControllerId>,
    {
        let indices: BTreeSet<usize> = controller_ids
            .into_iter()
            .map(|controller_id| self.stripe_of(tenant, controller_id))
            .collect();

        let mut guards = Vec::with_capacity(indices.len());
        for index in indices {
            guards.push(self.stripes[index].lock().await);
        }
        guards
    }
}

impl Default for EntityLocks {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn device(id: &str) -> ControllerId {
        ControllerId::new(id).unwrap()
    }

    #[test]
    fn test_stripe_is_stable() {
        let locks = EntityLocks::new(16);
        let tenant = TenantId::default();
        assert_eq!(
            locks.stripe_of(&tenant, &device("d1")),
            locks.stripe_of(&tenant, &device("d1"))
        );
        assert!(locks.stripe_of(&tenant, &device("d1")) < 16);
    }

    #[test]
    fn test_zero_stripes_becomes_one() {
        assert_eq!(EntityLocks::new(0).stripes(), 1);
    }

    #[tokio::test]
    async fn test_lock_all_deduplicates_stripes() {
        let locks = EntityLocks::new(1);
        let ids = [device("a"), device("b"), device("c")];
        let guards = locks.lock_all(&TenantId::default(), ids.iter()).await;
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn test_same_target_is_exclusive() {
        let locks = EntityLocks::new(4);
        let tenant = TenantId::default();
        let _held = locks.lock(&tenant, &device("d1")).await;
        let second =
            tokio::time::timeout(Duration::from_millis(20), locks.lock(&tenant, &device("d1"))).await;
        assert!(second.is_err());
    }
}
