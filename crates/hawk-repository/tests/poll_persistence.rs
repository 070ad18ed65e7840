//! Poll write path: coalescing, eager write-through, registration and failure handling

#![allow(clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use common::*;
use hawk_core::{Clock, HawkConfig, HawkError, SystemClock};
use hawk_repository::{
    NoopPublisher, PollStrategy, Registration, RepositoryRuntime, TargetEdit, TargetRequest,
};
use hawk_store::{MemoryStore, TargetStore, TargetUpdateStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_rapid_polls_coalesce_into_one_metadata_write() {
    let mut fx = coalescing(1_000);
    let registered = fx.poll("device-1").await;
    assert_eq!(registered.revision, 1);
    let writes_before = fx.store.stats();

    fx.clock.advance(100);
    fx.poll("device-1").await;
    fx.clock.advance(100);
    let second = fx.poll("device-1").await;
    assert_eq!(second.last_target_query, Some(START + 200));

    let writer = fx.runtime.poll_writer();
    assert_eq!(writer.pending(), 1);
    assert_eq!(writer.flush_due(fx.clock.now_millis()).await.records, 0);
    assert_eq!(fx.stored("device-1").await.last_target_query, Some(START));

    fx.clock.advance(1_000);
    let report = writer.flush_due(fx.clock.now_millis()).await;
    assert_eq!(report.records, 1);
    assert_eq!(report.statements, 1);
    assert_eq!(report.touched, 1);

    let stored = fx.stored("device-1").await;
    assert_eq!(stored.revision, 1);
    assert_eq!(stored.last_target_query, Some(START + 200));

    let writes_after = fx.store.stats();
    assert_eq!(writes_after.touches - writes_before.touches, 1);
    assert_eq!(writes_after.updates, writes_before.updates);

    let events = fx.drain_events();
    assert_eq!(count_kind(&events, "target_polled"), 3);
    assert_eq!(count_kind(&events, "target_updated"), 0);
}

#[tokio::test]
async fn test_deadline_is_not_pushed_by_later_polls() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;

    fx.clock.advance(10);
    fx.poll("device-1").await;
    for _ in 0..5 {
        fx.clock.advance(300);
        fx.poll("device-1").await;
    }
    // first poll of the window was at START + 10
    let report = fx
        .runtime
        .poll_writer()
        .flush_due(START + 10 + 1_000)
        .await;
    assert_eq!(report.touched, 1);
    assert_eq!(
        fx.stored("device-1").await.last_target_query,
        Some(START + 10 + 1_500)
    );
}

#[tokio::test]
async fn test_eager_mode_writes_each_poll() {
    let fx = eager();
    assert_eq!(fx.runtime.poll_writer().strategy(), PollStrategy::Immediate);
    fx.poll("device-1").await;

    for step in 1..=3 {
        fx.clock.advance(50);
        fx.poll("device-1").await;
        assert_eq!(fx.store.stats().touches, step);
        assert_eq!(
            fx.stored("device-1").await.last_target_query,
            Some(START + 50 * step)
        );
    }
    assert_eq!(fx.runtime.poll_writer().pending(), 0);
    assert_eq!(fx.stored("device-1").await.revision, 1);
}

#[tokio::test]
async fn test_unknown_target_is_created_synchronously_once() {
    let mut fx = coalescing(1_000);
    let created = fx.poll("fresh").await;
    assert_eq!(created.update_status, TargetUpdateStatus::Registered);
    assert_eq!(created.last_target_query, Some(START));
    assert_eq!(fx.runtime.poll_writer().pending(), 0);
    assert_eq!(fx.store.stats().creates, 1);

    fx.clock.advance(5);
    fx.poll("fresh").await;

    let events = fx.drain_events();
    assert_eq!(count_kind(&events, "target_created"), 1);
    assert_eq!(count_kind(&events, "target_polled"), 2);
}

#[tokio::test]
async fn test_first_poll_of_managed_target_registers_it() {
    let mut fx = coalescing(1_000);
    let created = fx
        .runtime
        .targets()
        .create(&admin(), TargetRequest::new(device("managed")))
        .await
        .unwrap();
    assert_eq!(created.update_status, TargetUpdateStatus::Unknown);
    assert_eq!(created.last_target_query, None);
    fx.drain_events();

    fx.clock.advance(10);
    let polled = fx.poll("managed").await;
    assert_eq!(polled.update_status, TargetUpdateStatus::Registered);
    assert_eq!(polled.revision, 2);
    assert_eq!(polled.last_target_query, Some(START + 10));
    assert_eq!(fx.runtime.poll_writer().pending(), 0);

    let events = fx.drain_events();
    assert_eq!(count_kind(&events, "target_created"), 0);
    assert_eq!(count_kind(&events, "target_updated"), 1);
}

#[tokio::test]
async fn test_address_change_is_written_immediately() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;
    fx.clock.advance(20);

    let moved = fx
        .runtime
        .controller()
        .find_or_register(
            &controller_principal("device-1"),
            &device("device-1"),
            Registration::at_address("http://10.0.0.7"),
        )
        .await
        .unwrap();
    assert_eq!(moved.revision, 2);
    assert_eq!(moved.address.as_deref(), Some("http://10.0.0.7"));
    assert_eq!(fx.runtime.poll_writer().pending(), 0);

    let stored = fx.stored("device-1").await;
    assert_eq!(stored.address.as_deref(), Some("http://10.0.0.7"));
    assert_eq!(stored.last_target_query, Some(START + 20));
}

#[tokio::test]
async fn test_buffered_poll_does_not_collide_with_content_update() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;
    fx.clock.advance(100);
    fx.poll("device-1").await;

    let renamed = fx
        .runtime
        .targets()
        .update(
            &admin(),
            &device("device-1"),
            1,
            TargetEdit {
                name: Some("kitchen".to_string()),
                ..TargetEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.revision, 2);

    fx.clock.advance(1_000);
    fx.runtime.poll_writer().flush_due(fx.clock.now_millis()).await;
    let stored = fx.stored("device-1").await;
    assert_eq!(stored.revision, 2);
    assert_eq!(stored.name, "kitchen");
    assert_eq!(stored.last_target_query, Some(START + 100));
}

#[tokio::test]
async fn test_failed_flush_drops_records() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;
    fx.poll("device-2").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;
    fx.poll("device-2").await;

    fx.store.fail_next_touches(1);
    fx.clock.advance(1_000);
    let writer = fx.runtime.poll_writer();
    let report = writer.flush_due(fx.clock.now_millis()).await;
    assert_eq!(report.records, 2);
    assert_eq!(report.statements, 1);
    assert_eq!(report.dropped, 2);
    assert_eq!(report.touched, 0);
    assert_eq!(writer.pending(), 0);

    // Nothing was re-queued
    assert_eq!(writer.flush_all().await.records, 0);
    assert_eq!(fx.stored("device-1").await.last_target_query, Some(START));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_flush_drops_records() {
    let fx = fixture(|config| {
        config.repository.poll_persistence_flush_time_ms = 1_000;
        config.repository.poll_flush_timeout_ms = 50;
    });
    fx.poll("device-1").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;

    fx.store.set_touch_latency(Some(Duration::from_millis(500)));
    fx.clock.advance(1_000);
    let report = fx.runtime.poll_writer().flush_due(fx.clock.now_millis()).await;
    assert_eq!(report.dropped, 1);
    assert_eq!(report.touched, 0);

    fx.store.set_touch_latency(None);
    assert_eq!(fx.stored("device-1").await.last_target_query, Some(START));
}

#[tokio::test]
async fn test_full_queue_writes_through() {
    let fx = fixture(|config| {
        config.repository.poll_persistence_flush_time_ms = 1_000;
        config.repository.poll_persistence_queue_size = 1;
    });
    fx.poll("device-1").await;
    fx.poll("device-2").await;
    fx.clock.advance(10);

    fx.poll("device-1").await;
    assert_eq!(fx.store.stats().touches, 0);
    fx.poll("device-2").await;
    assert_eq!(fx.store.stats().touches, 1);
    assert_eq!(fx.runtime.poll_writer().pending(), 1);
    assert_eq!(fx.stored("device-2").await.last_target_query, Some(START + 10));
}

#[tokio::test]
async fn test_flush_chunks_statements() {
    let fx = fixture(|config| {
        config.repository.poll_persistence_flush_time_ms = 1_000;
        config.repository.max_entries_in_statement = 2;
    });
    for id in ["a", "b", "c", "d", "e"] {
        fx.poll(id).await;
    }
    fx.clock.advance(10);
    for id in ["a", "b", "c", "d", "e"] {
        fx.poll(id).await;
    }

    let report = fx.runtime.poll_writer().flush_all().await;
    assert_eq!(report.records, 5);
    assert_eq!(report.statements, 3);
    assert_eq!(report.touched, 5);
}

#[tokio::test]
async fn test_deleted_target_is_discarded_from_buffer() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;
    assert_eq!(fx.runtime.poll_writer().pending(), 1);

    fx.runtime
        .controller()
        .delete_target(&controller_principal("device-1"), &device("device-1"))
        .await
        .unwrap();
    assert_eq!(fx.runtime.poll_writer().pending(), 0);
    assert!(fx
        .store
        .get_target(&tenant(), &device("device-1"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_flush_of_vanished_target_touches_nothing() {
    let fx = coalescing(1_000);
    fx.poll("device-1").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;

    // Removed behind the service's back
    fx.store
        .delete_target(&tenant(), &device("device-1"))
        .await
        .unwrap();
    let report = fx.runtime.poll_writer().flush_all().await;
    assert_eq!(report.records, 1);
    assert_eq!(report.touched, 0);
    assert_eq!(report.dropped, 0);
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_polls() {
    let fx = coalescing(60_000);
    fx.runtime.start();
    fx.poll("device-1").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;

    let report = fx.runtime.shutdown().await;
    assert_eq!(report.touched, 1);
    assert_eq!(fx.stored("device-1").await.last_target_query, Some(START + 10));
}

#[tokio::test]
async fn test_background_sweep_flushes_due_polls() {
    let fx = coalescing(40);
    fx.runtime.start();
    fx.poll("device-1").await;
    fx.clock.advance(10);
    fx.poll("device-1").await;
    fx.clock.advance(100);

    let mut flushed = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if fx.runtime.poll_writer().pending() == 0 {
            flushed = true;
            break;
        }
    }
    assert!(flushed);
    assert_eq!(fx.stored("device-1").await.last_target_query, Some(START + 10));
    fx.runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweep_flushes_within_the_window_on_wall_clock() {
    const WINDOW_MS: u64 = 400;
    let mut config = HawkConfig::default();
    config.repository.eager_poll_persistence = false;
    config.repository.poll_persistence_flush_time_ms = WINDOW_MS;
    let store = Arc::new(MemoryStore::new());
    let runtime = RepositoryRuntime::with_parts(
        config,
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(NoopPublisher),
    )
    .unwrap();
    runtime.start();

    let controller = runtime.controller();
    let principal = controller_principal("device-1");
    controller
        .find_or_register(&principal, &device("device-1"), Registration::default())
        .await
        .unwrap();

    // Offsets that do not line up with the sweep ticks
    for offset_ms in [0, 37, 71, 113] {
        tokio::time::sleep(Duration::from_millis(offset_ms)).await;
        controller
            .find_or_register(&principal, &device("device-1"), Registration::default())
            .await
            .unwrap();
        assert_eq!(runtime.poll_writer().pending(), 1);

        tokio::time::sleep(Duration::from_millis(WINDOW_MS + 40)).await;
        assert_eq!(
            runtime.poll_writer().pending(),
            0,
            "poll buffered longer than the window (offset {offset_ms} ms)"
        );
    }
    let stored = store
        .get_target(&tenant(), &device("device-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.revision, 1);
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_polls_and_updates_keep_revisions() {
    let fx = coalescing(1_000);
    let ids = ["d0", "d1", "d2", "d3"];
    for id in ids {
        fx.poll(id).await;
    }

    let mut handles = Vec::new();
    for id in ids {
        let controller = fx.runtime.controller();
        let clock = fx.clock.clone();
        handles.push(tokio::spawn(async move {
            let principal = controller_principal(id);
            for _ in 0..50 {
                clock.advance(1);
                controller
                    .find_or_register(&principal, &device(id), Registration::default())
                    .await
                    .unwrap();
            }
        }));
    }

    let targets = fx.runtime.targets();
    let store = fx.store.clone();
    handles.push(tokio::spawn(async move {
        let mut applied = 0;
        while applied < 10 {
            let current = store.get_target(&tenant(), &device("d0")).await.unwrap().unwrap();
            let edit = TargetEdit {
                description: Some(format!("edit {applied}")),
                ..TargetEdit::default()
            };
            match targets.update(&admin(), &device("d0"), current.revision, edit).await {
                Ok(_) => applied += 1,
                Err(HawkError::OptimisticLock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }));

    for handle in handles {
        handle.await.unwrap();
    }
    let report = fx.runtime.poll_writer().flush_all().await;
    assert_eq!(report.touched, 4);

    let final_time = fx.clock.now_millis();
    assert_eq!(fx.stored("d0").await.revision, 11);
    for id in ids {
        let stored = fx.stored(id).await;
        assert!(stored.last_target_query.unwrap() <= final_time);
        assert!(stored.last_target_query.unwrap() > START);
        if id != "d0" {
            assert_eq!(stored.revision, 1);
        }
    }
}

#[tokio::test]
async fn test_anonymous_caller_cannot_poll() {
    let fx = coalescing(1_000);
    let result = fx
        .runtime
        .controller()
        .find_or_register(
            &hawk_core::Principal::anonymous(tenant()),
            &device("device-1"),
            Registration::default(),
        )
        .await;
    assert_matches!(result, Err(HawkError::Unauthenticated { .. }));
    assert_eq!(fx.store.stats().creates, 0);
}
