//! Eager strategy: one write per poll

use super::{DirectWrites, Poll, PollOutcome, PollStrategy, PollWriter};
use async_trait::async_trait;
use hawk_core::{HawkResult, TenantId};
use hawk_store::Target;

/// Writes every poll through as it arrives
pub struct ImmediateWriter {
    writes: DirectWrites,
}

impl ImmediateWriter {
    pub(crate) fn new(writes: DirectWrites) -> Self {
        Self { writes }
    }
}

#[async_trait]
impl PollWriter for ImmediateWriter {
    fn strategy(&self) -> PollStrategy {
        PollStrategy::Immediate
    }

    async fn record_poll(
        &self,
        tenant: &TenantId,
        target: &Target,
        poll: &Poll,
    ) -> HawkResult<PollOutcome> {
        if poll.content_update(target).is_some() {
            return self
                .writes
                .content(tenant, &target.controller_id, poll)
                .await;
        }
        self.writes
            .touch(tenant, &target.controller_id, poll.polled_at)
            .await
    }
}
