//! Shared fixtures for repository integration tests

#![allow(dead_code, clippy::unwrap_used)]

use hawk_core::{ControllerId, HawkConfig, ManualClock, Principal, TenantId};
use hawk_repository::{BroadcastPublisher, Registration, RepositoryEvent, RepositoryRuntime};
use hawk_store::{MemoryStore, Target, TargetStore};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const START: u64 = 1_700_000_000_000;

pub struct Fixture {
    pub runtime: RepositoryRuntime,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub events: broadcast::Receiver<RepositoryEvent>,
}

/// Runtime on a manual clock; `configure` adjusts the defaults
pub fn fixture(configure: impl FnOnce(&mut HawkConfig)) -> Fixture {
    let mut config = HawkConfig::default();
    configure(&mut config);

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_at(START));
    let publisher = Arc::new(BroadcastPublisher::new(1024));
    let events = publisher.subscribe();
    let runtime =
        RepositoryRuntime::with_parts(config, store.clone(), clock.clone(), publisher).unwrap();

    Fixture {
        runtime,
        store,
        clock,
        events,
    }
}

/// Coalescing runtime with the given flush window
pub fn coalescing(flush_ms: u64) -> Fixture {
    fixture(|config| {
        config.repository.eager_poll_persistence = false;
        config.repository.poll_persistence_flush_time_ms = flush_ms;
    })
}

/// Runtime writing every poll through
pub fn eager() -> Fixture {
    fixture(|config| config.repository.eager_poll_persistence = true)
}

pub fn tenant() -> TenantId {
    TenantId::default()
}

pub fn device(id: &str) -> ControllerId {
    ControllerId::new(id).unwrap()
}

pub fn admin() -> Principal {
    Principal::admin("admin", tenant())
}

pub fn user(authorities: &[&str]) -> Principal {
    Principal::user("operator", tenant(), authorities.iter().copied())
}

pub fn controller_principal(id: &str) -> Principal {
    Principal::controller(id, tenant())
}

impl Fixture {
    /// Poll as the device itself, reporting nothing but its presence
    pub async fn poll(&self, id: &str) -> Target {
        self.runtime
            .controller()
            .find_or_register(&controller_principal(id), &device(id), Registration::default())
            .await
            .unwrap()
    }

    /// Target as currently persisted
    pub async fn stored(&self, id: &str) -> Target {
        self.store
            .get_target(&tenant(), &device(id))
            .await
            .unwrap()
            .unwrap()
    }

    /// Events published since the last drain
    pub fn drain_events(&mut self) -> Vec<RepositoryEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn count_kind(events: &[RepositoryEvent], kind: &str) -> usize {
    events.iter().filter(|event| event.kind() == kind).count()
}
