//! Lazy strategy: buffer polls, flush in batches
//!
//! A poll of an existing target opens (or joins) a buffering window in
//! [`PendingPolls`]. The flush sweep drains windows whose deadline has passed,
//! groups them by tenant, and writes each group in chunks of at most
//! `max_entries_in_statement` targets, one touch statement per chunk.
//!
//! Storage failures are absorbed: the chunk's records are logged and dropped,
//! never re-queued, so a failing store cannot make the buffer grow.

use super::{
    millis, DirectWrites, DuePoll, FlushReport, PendingPolls, Poll, PollOutcome, PollStrategy,
    PollWriter, RecordOutcome,
};
use async_trait::async_trait;
use hawk_core::{ControllerId, HawkResult, RepositoryConfig, TenantId};
use hawk_store::Target;
use std::collections::BTreeMap;
use std::time::Duration;

/// Buffers poll timestamps and writes them on a bounded delay
pub struct CoalescingWriter {
    writes: DirectWrites,
    pending: PendingPolls,
    flush_interval_ms: u64,
    flush_timeout: Duration,
    chunk_size: usize,
}

impl CoalescingWriter {
    pub(crate) fn new(writes: DirectWrites, config: &RepositoryConfig) -> Self {
        Self {
            writes,
            pending: PendingPolls::new(config.poll_persistence_queue_size),
            flush_interval_ms: config.poll_persistence_flush_time_ms,
            flush_timeout: config.flush_timeout(),
            chunk_size: config.max_entries_in_statement.max(1),
        }
    }

    /// The buffered records
    pub fn pending_polls(&self) -> &PendingPolls {
        &self.pending
    }

    async fn write(&self, due: Vec<DuePoll>) -> FlushReport {
        let mut report = FlushReport {
            records: due.len(),
            ..FlushReport::default()
        };
        if due.is_empty() {
            return report;
        }

        let mut by_tenant: BTreeMap<TenantId, Vec<(ControllerId, u64)>> = BTreeMap::new();
        for poll in due {
            by_tenant
                .entry(poll.tenant)
                .or_default()
                .push((poll.controller_id, poll.polled_at));
        }

        for (tenant, entries) in &by_tenant {
            for chunk in entries.chunks(self.chunk_size) {
                report.absorb(self.write_chunk(tenant, chunk).await);
            }
        }

        tracing::debug!(
            records = report.records,
            statements = report.statements,
            touched = report.touched,
            dropped = report.dropped,
            "flushed buffered polls"
        );
        report
    }

    async fn write_chunk(&self, tenant: &TenantId, chunk: &[(ControllerId, u64)]) -> FlushReport {
        let _guards = self
            .writes
            .locks()
            .lock_all(tenant, chunk.iter().map(|(controller_id, _)| controller_id))
            .await;

        let statement = self.writes.store().touch_last_query(tenant, chunk);
        let mut report = FlushReport {
            statements: 1,
            ..FlushReport::default()
        };
        match tokio::time::timeout(self.flush_timeout, statement).await {
            Ok(Ok(touched)) => {
                if touched < chunk.len() {
                    tracing::warn!(
                        %tenant,
                        expected = chunk.len(),
                        touched,
                        "poll flush touched fewer targets than buffered"
                    );
                }
                report.touched = touched;
            }
            Ok(Err(err)) => {
                tracing::error!(
                    %tenant,
                    records = chunk.len(),
                    error = %err,
                    "poll flush failed, records dropped"
                );
                report.dropped = chunk.len();
            }
            Err(_) => {
                tracing::error!(
                    %tenant,
                    records = chunk.len(),
                    timeout_ms = millis(self.flush_timeout),
                    "poll flush timed out, records dropped"
                );
                report.dropped = chunk.len();
            }
        }
        report
    }
}

#[async_trait]
impl PollWriter for CoalescingWriter {
    fn strategy(&self) -> PollStrategy {
        PollStrategy::Coalescing
    }

    async fn record_poll(
        &self,
        tenant: &TenantId,
        target: &Target,
        poll: &Poll,
    ) -> HawkResult<PollOutcome> {
        let controller_id = &target.controller_id;
        if poll.content_update(target).is_some() {
            return self.writes.content(tenant, controller_id, poll).await;
        }

        let deadline = poll.polled_at.saturating_add(self.flush_interval_ms);
        match self.pending.record(tenant, controller_id, poll.polled_at, deadline) {
            RecordOutcome::Created { deadline } => {
                tracing::trace!(%tenant, %controller_id, deadline, "poll buffered");
                Ok(PollOutcome::Buffered)
            }
            RecordOutcome::Coalesced => Ok(PollOutcome::Buffered),
            RecordOutcome::Full => {
                tracing::debug!(%tenant, %controller_id, "poll buffer full, writing through");
                self.writes.touch(tenant, controller_id, poll.polled_at).await
            }
        }
    }

    fn discard(&self, tenant: &TenantId, controller_id: &ControllerId) {
        self.pending.remove(tenant, controller_id);
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn flush_due(&self, now: u64) -> FlushReport {
        self.write(self.pending.take_due(now)).await
    }

    async fn flush_all(&self) -> FlushReport {
        self.write(self.pending.take_all()).await
    }
}
