//! Poll write path
//!
//! Devices poll often and most polls change nothing but the target's
//! last-query time. That timestamp is metadata: writing it never bumps the
//! target's optimistic-lock revision. How it reaches storage is a strategy
//! chosen once from configuration:
//!
//! - [`ImmediateWriter`] writes every poll through.
//! - [`CoalescingWriter`] buffers polls in [`PendingPolls`] and writes them in
//!   batches once their window's deadline passes.
//!
//! Polls that change content (address, name, type, or the first poll of a
//! target still in `Unknown` status) are written immediately by both
//! strategies and do bump the revision.

mod coalescing;
mod immediate;
mod pending;

pub use coalescing::CoalescingWriter;
pub use immediate::ImmediateWriter;
pub use pending::{DuePoll, PendingPoll, PendingPolls, RecordOutcome};

use crate::locks::EntityLocks;
use async_trait::async_trait;
use hawk_core::{ControllerId, HawkError, HawkResult, RepositoryConfig, TenantId};
use hawk_store::{RepositoryStore, Target, TargetUpdate, TargetUpdateStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a device reported when it polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    /// Epoch milliseconds the poll was received
    pub polled_at: u64,
    /// Address the device was reached at
    pub address: Option<String>,
    /// Display name the device asked for
    pub name: Option<String>,
    /// Target type the device announced
    pub target_type: Option<String>,
}

impl Poll {
    /// Poll that carries nothing but its time
    pub fn at(polled_at: u64) -> Self {
        Self {
            polled_at,
            address: None,
            name: None,
            target_type: None,
        }
    }

    /// Content update this poll implies for `target`, if any
    pub fn content_update(&self, target: &Target) -> Option<TargetUpdate> {
        let changed = |reported: &Option<String>, stored: Option<&str>| {
            reported
                .as_deref()
                .is_some_and(|reported| Some(reported) != stored)
        };

        let address = changed(&self.address, target.address.as_deref());
        let name = changed(&self.name, Some(target.name.as_str()));
        let target_type = changed(&self.target_type, target.target_type.as_deref());
        let unknown = target.update_status == TargetUpdateStatus::Unknown;
        if !(address || name || target_type || unknown) {
            return None;
        }

        Some(TargetUpdate {
            address: self.address.clone().filter(|_| address),
            name: self.name.clone().filter(|_| name),
            target_type: self.target_type.clone().filter(|_| target_type),
            update_status: unknown.then_some(TargetUpdateStatus::Registered),
            last_target_query: Some(self.polled_at),
            ..TargetUpdate::default()
        })
    }
}

/// How a poll reached (or will reach) storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Content changed; written with a revision bump
    Updated(Target),
    /// Timestamp written through without a revision bump
    Touched,
    /// Timestamp buffered for a later flush
    Buffered,
}

/// Counters of one flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records taken from the registry
    pub records: usize,
    /// Touch statements issued
    pub statements: usize,
    /// Targets whose timestamp was written
    pub touched: usize,
    /// Records lost to failed or timed-out statements
    pub dropped: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.records += other.records;
        self.statements += other.statements;
        self.touched += other.touched;
        self.dropped += other.dropped;
    }
}

/// Which write strategy is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// Every poll is written through
    Immediate,
    /// Polls are buffered and flushed in batches
    Coalescing,
}

impl fmt::Display for PollStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStrategy::Immediate => f.write_str("immediate"),
            PollStrategy::Coalescing => f.write_str("coalescing"),
        }
    }
}

/// Write path for polls of existing targets
#[async_trait]
pub trait PollWriter: Send + Sync {
    /// Active strategy
    fn strategy(&self) -> PollStrategy;

    /// Persist (or schedule) a poll of `target`, as read by the caller
    async fn record_poll(
        &self,
        tenant: &TenantId,
        target: &Target,
        poll: &Poll,
    ) -> HawkResult<PollOutcome>;

    /// Forget anything buffered for a target that is going away
    fn discard(&self, _tenant: &TenantId, _controller_id: &ControllerId) {}

    /// Number of buffered records
    fn pending(&self) -> usize {
        0
    }

    /// Write every record whose deadline is at or before `now`
    async fn flush_due(&self, _now: u64) -> FlushReport {
        FlushReport::default()
    }

    /// Write every record regardless of deadline
    async fn flush_all(&self) -> FlushReport {
        FlushReport::default()
    }
}

/// Pick the write strategy from configuration
pub fn poll_writer_from_config(
    config: &RepositoryConfig,
    store: Arc<dyn RepositoryStore>,
    locks: Arc<EntityLocks>,
) -> Arc<dyn PollWriter> {
    let writes = DirectWrites::new(store, locks);
    if config.eager_poll_persistence {
        tracing::info!("poll persistence is eager");
        Arc::new(ImmediateWriter::new(writes))
    } else {
        tracing::info!(
            flush_ms = config.poll_persistence_flush_time_ms,
            queue_size = config.poll_persistence_queue_size,
            "poll persistence is coalescing"
        );
        Arc::new(CoalescingWriter::new(writes, config))
    }
}

/// Whole milliseconds of a duration, saturating at `u64::MAX`
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Writes both strategies perform without buffering, each under the target's lock
#[derive(Clone)]
pub(crate) struct DirectWrites {
    store: Arc<dyn RepositoryStore>,
    locks: Arc<EntityLocks>,
}

impl DirectWrites {
    pub(crate) fn new(store: Arc<dyn RepositoryStore>, locks: Arc<EntityLocks>) -> Self {
        Self { store, locks }
    }

    pub(crate) fn store(&self) -> &Arc<dyn RepositoryStore> {
        &self.store
    }

    pub(crate) fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    /// Apply a content-changing poll against the current revision
    pub(crate) async fn content(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        poll: &Poll,
    ) -> HawkResult<PollOutcome> {
        let _guard = self.locks.lock(tenant, controller_id).await;
        let current = self
            .store
            .get_target(tenant, controller_id)
            .await?
            .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;

        // Another writer may have applied the same change meanwhile
        match poll.content_update(&current) {
            Some(update) => {
                let updated = self
                    .store
                    .update_target(tenant, controller_id, current.revision, update)
                    .await?;
                Ok(PollOutcome::Updated(updated))
            }
            None => {
                self.store
                    .touch_last_query(tenant, &[(controller_id.clone(), poll.polled_at)])
                    .await?;
                Ok(PollOutcome::Touched)
            }
        }
    }

    /// Write one poll timestamp through
    pub(crate) async fn touch(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        polled_at: u64,
    ) -> HawkResult<PollOutcome> {
        let _guard = self.locks.lock(tenant, controller_id).await;
        let touched = self
            .store
            .touch_last_query(tenant, &[(controller_id.clone(), polled_at)])
            .await?;
        if touched == 0 {
            return Err(HawkError::not_found(format!("target {controller_id}")));
        }
        Ok(PollOutcome::Touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn registered() -> Target {
        Target {
            tenant: TenantId::default(),
            controller_id: ControllerId::new("d1").unwrap(),
            name: "d1".to_string(),
            description: None,
            address: Some("http://10.0.0.1".to_string()),
            target_type: None,
            update_status: TargetUpdateStatus::Registered,
            attributes: BTreeMap::new(),
            tags: BTreeSet::new(),
            security_token: "t".to_string(),
            auto_confirmation: None,
            last_target_query: Some(1),
            created_at: 1,
            revision: 3,
        }
    }

    #[test]
    fn test_pure_poll_has_no_content_update() {
        let mut poll = Poll::at(10);
        poll.address = Some("http://10.0.0.1".to_string());
        assert_eq!(poll.content_update(&registered()), None);
    }

    #[test]
    fn test_address_change_is_content() {
        let mut poll = Poll::at(10);
        poll.address = Some("http://10.0.0.2".to_string());
        let update = poll.content_update(&registered()).unwrap();
        assert_eq!(update.address.as_deref(), Some("http://10.0.0.2"));
        assert_eq!(update.name, None);
        assert_eq!(update.last_target_query, Some(10));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(250)), 250);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_unknown_status_is_content() {
        let mut target = registered();
        target.update_status = TargetUpdateStatus::Unknown;
        let update = Poll::at(10).content_update(&target).unwrap();
        assert_eq!(update.update_status, Some(TargetUpdateStatus::Registered));
    }
}
