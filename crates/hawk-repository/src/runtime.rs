//! Repository runtime
//!
//! Wires the store, gatekeeper, entity locks and poll writer into one shared
//! [`RepositoryContext`] and hands out the guarded services built on it. With
//! the coalescing strategy, [`RepositoryRuntime::start`] launches the sweep
//! that flushes buffered polls once their deadline has passed.

use crate::events::{EventPublisher, NoopPublisher};
use crate::locks::EntityLocks;
use crate::poll::{millis, poll_writer_from_config, FlushReport, PollStrategy, PollWriter};
use crate::services::{
    ConfirmationManagement, ControllerManagement, RepositoryContext, RolloutGroupManagement,
    SoftwareModuleTypeManagement, SystemManagement, TagManagement, TargetManagement,
};
use crate::tasks::TaskRegistry;
use hawk_authorization::{Gatekeeper, PolicyRegistry};
use hawk_core::{Clock, HawkConfig, HawkResult, SystemClock};
use hawk_store::RepositoryStore;
use std::sync::Arc;
use std::time::Duration;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Running repository layer
pub struct RepositoryRuntime {
    config: HawkConfig,
    ctx: RepositoryContext,
    controller: ControllerManagement,
    tasks: TaskRegistry,
}

impl RepositoryRuntime {
    /// Runtime on the system clock without event subscribers
    pub fn new(config: HawkConfig, store: Arc<dyn RepositoryStore>) -> HawkResult<Self> {
        Self::with_parts(config, store, Arc::new(SystemClock), Arc::new(NoopPublisher))
    }

    /// Runtime with an explicit clock and event sink
    pub fn with_parts(
        config: HawkConfig,
        store: Arc<dyn RepositoryStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
    ) -> HawkResult<Self> {
        config.validate()?;
        let registry = PolicyRegistry::from_config(&config.policy)?;
        let locks = Arc::new(EntityLocks::new(config.repository.entity_lock_stripes));
        let poll_writer = poll_writer_from_config(&config.repository, store.clone(), locks.clone());

        let ctx = RepositoryContext {
            store,
            gatekeeper: Gatekeeper::new(registry),
            events,
            clock,
            locks,
            poll_writer,
        };
        let controller = ControllerManagement::new(ctx.clone(), &config.controller)?;

        Ok(Self {
            config,
            ctx,
            controller,
            tasks: TaskRegistry::new(),
        })
    }

    /// Launch background work; a no-op for the immediate strategy
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.ctx.poll_writer.strategy() != PollStrategy::Coalescing || !self.tasks.is_empty() {
            return;
        }
        let interval = self.sweep_interval();
        let horizon_ms = millis(interval);
        let writer = self.ctx.poll_writer.clone();
        let clock = self.ctx.clock.clone();
        tracing::info!(interval_ms = horizon_ms, "starting poll flush sweep");

        // A tick also takes records falling due before the next tick, so no
        // record waits past its deadline
        self.tasks.spawn_interval_until(interval, move || {
            let writer = writer.clone();
            let horizon = clock.now_millis().saturating_add(horizon_ms);
            async move {
                let report = writer.flush_due(horizon).await;
                if report.records > 0 {
                    tracing::trace!(
                        records = report.records,
                        touched = report.touched,
                        "sweep tick"
                    );
                }
                true
            }
        });
    }

    /// Stop background work and flush whatever is still buffered
    pub async fn shutdown(&self) -> FlushReport {
        self.tasks.shutdown().await;
        let report = self.ctx.poll_writer.flush_all().await;
        tracing::info!(
            records = report.records,
            touched = report.touched,
            dropped = report.dropped,
            "repository runtime stopped"
        );
        report
    }

    fn sweep_interval(&self) -> Duration {
        let window = self.config.repository.flush_interval();
        (window / 4)
            .max(MIN_SWEEP_INTERVAL.min(window))
            .max(Duration::from_millis(1))
    }

    /// Validated configuration in effect
    pub fn config(&self) -> &HawkConfig {
        &self.config
    }

    /// Shared collaborators
    pub fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    /// Active poll writer
    pub fn poll_writer(&self) -> &Arc<dyn PollWriter> {
        &self.ctx.poll_writer
    }

    /// Device-facing service
    pub fn controller(&self) -> ControllerManagement {
        self.controller.clone()
    }

    /// Target service
    pub fn targets(&self) -> TargetManagement {
        TargetManagement::new(self.ctx.clone())
    }

    /// Tag service
    pub fn tags(&self) -> TagManagement {
        TagManagement::new(self.ctx.clone())
    }

    /// Software module type service
    pub fn module_types(&self) -> SoftwareModuleTypeManagement {
        SoftwareModuleTypeManagement::new(self.ctx.clone())
    }

    /// Rollout group queries
    pub fn rollout_groups(&self) -> RolloutGroupManagement {
        RolloutGroupManagement::new(self.ctx.clone())
    }

    /// Confirmation workflow
    pub fn confirmations(&self) -> ConfirmationManagement {
        ConfirmationManagement::new(self.ctx.clone())
    }

    /// Server time and usage
    pub fn system(&self) -> SystemManagement {
        SystemManagement::new(self.ctx.clone())
    }
}
