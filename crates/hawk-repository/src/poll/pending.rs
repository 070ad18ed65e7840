//! Pending poll registry
//!
//! Holds at most one record per `(tenant, controller id)`. The record's
//! deadline is fixed when the record is created; later polls in the same
//! buffering window only move the timestamp forward. Records are spread over
//! shards so polls of unrelated targets do not contend on one lock.

use hawk_core::{ControllerId, TenantId};
use parking_lot::Mutex;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

const SHARDS: usize = 16;

type Key = (TenantId, ControllerId);

/// Buffered, not yet persisted poll of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPoll {
    /// Latest poll time seen in this window
    pub polled_at: u64,
    /// When the record must be flushed at the latest
    pub deadline: u64,
}

/// Result of buffering one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First poll of a window; a record with this deadline now exists
    Created {
        /// Flush deadline of the new record
        deadline: u64,
    },
    /// Merged into the existing record
    Coalesced,
    /// Registry is at capacity; the poll was not buffered
    Full,
}

/// Poll that left the registry and must be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePoll {
    /// Owning tenant
    pub tenant: TenantId,
    /// Target that polled
    pub controller_id: ControllerId,
    /// Latest poll time of the window
    pub polled_at: u64,
}

/// Sharded map of pending poll records with a global capacity
#[derive(Debug)]
pub struct PendingPolls {
    shards: Vec<Mutex<HashMap<Key, PendingPoll>>>,
    len: AtomicUsize,
    capacity: usize,
}

impl PendingPolls {
    /// Registry holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records currently buffered
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> &Mutex<HashMap<Key, PendingPoll>> {
        let mut hasher = DefaultHasher::new();
        tenant.hash(&mut hasher);
        controller_id.hash(&mut hasher);
        &self.shards[(hasher.finish() % SHARDS as u64) as usize]
    }

    /// Buffer a poll; `deadline` only applies if this opens a new window
    pub fn record(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        polled_at: u64,
        deadline: u64,
    ) -> RecordOutcome {
        let mut shard = self.shard(tenant, controller_id).lock();
        match shard.entry((tenant.clone(), controller_id.clone())) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.polled_at = record.polled_at.max(polled_at);
                RecordOutcome::Coalesced
            }
            Entry::Vacant(vacant) => {
                let reserved = self
                    .len
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                        (len < self.capacity).then_some(len + 1)
                    })
                    .is_ok();
                if !reserved {
                    return RecordOutcome::Full;
                }
                vacant.insert(PendingPoll {
                    polled_at,
                    deadline,
                });
                RecordOutcome::Created { deadline }
            }
        }
    }

    /// Buffered record of a target, if any
    pub fn get(&self, tenant: &TenantId, controller_id: &ControllerId) -> Option<PendingPoll> {
        self.shard(tenant, controller_id)
            .lock()
            .get(&(tenant.clone(), controller_id.clone()))
            .copied()
    }

    /// Drop the record of a target without writing it
    pub fn remove(&self, tenant: &TenantId, controller_id: &ControllerId) -> bool {
        let removed = self
            .shard(tenant, controller_id)
            .lock()
            .remove(&(tenant.clone(), controller_id.clone()))
            .is_some();
        if removed {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Remove and return every record whose deadline is at or before `now`
    pub fn take_due(&self, now: u64) -> Vec<DuePoll> {
        self.drain_where(|record| record.deadline <= now)
    }

    /// Remove and return every record
    pub fn take_all(&self) -> Vec<DuePoll> {
        self.drain_where(|_| true)
    }

    /// Earliest deadline among buffered records
    pub fn next_deadline(&self) -> Option<u64> {
        self.shards
            .iter()
            .filter_map(|shard| shard.lock().values().map(|record| record.deadline).min())
            .min()
    }

    fn drain_where(&self, due: impl Fn(&PendingPoll) -> bool) -> Vec<DuePoll> {
        let mut taken = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.lock();
            let keys: Vec<Key> = shard
                .iter()
                .filter(|(_, record)| due(record))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(record) = shard.remove(&key) {
                    let (tenant, controller_id) = key;
                    taken.push(DuePoll {
                        tenant,
                        controller_id,
                        polled_at: record.polled_at,
                    });
                }
            }
        }
        self.len.fetch_sub(taken.len(), Ordering::AcqRel);
        taken
    }
}
