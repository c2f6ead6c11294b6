use std::time::Duration;

use super::*;
use crate::test_support::FakeBackend;
use shared::domain::SquareId;

fn spawn_session(backend: &Arc<FakeBackend>, interval_ms: u64) -> SessionHandle {
    let backend = Arc::clone(backend) as Arc<dyn SquareBackend>;
    let monitor = ConnectivityMonitor::new(
        Arc::clone(&backend),
        Duration::from_millis(interval_ms),
        Duration::from_millis(500),
    );
    SessionHandle::spawn_with(SyncCoordinator::new(backend), monitor)
}

async fn wait_for(handle: &SessionHandle, done: impl Fn(&SyncSnapshot) -> bool) -> SyncSnapshot {
    for _ in 0..200 {
        let snapshot = handle.snapshot().await.expect("snapshot");
        if done(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached the expected state");
}

#[tokio::test]
async fn loads_before_serving_requests() {
    let backend = FakeBackend::with_squares(&[1, 2]);
    let handle = spawn_session(&backend, 60_000);

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.square_count(), 2);
    assert_eq!(snapshot.next_id, SquareId(3));

    let outcome = handle.add_square().await.expect("add");
    assert!(matches!(outcome, AddOutcome::Persisted(s) if s.id == SquareId(3)));
    assert_eq!(backend.stored_ids(), vec![1, 2, 3]);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn reconnect_flushes_queue_without_user_action() {
    let backend = FakeBackend::new();
    backend.set_online(false);
    let handle = spawn_session(&backend, 20);

    let outcome = handle.add_square().await.expect("add");
    assert!(matches!(outcome, AddOutcome::Queued(_)));
    assert_eq!(handle.snapshot().await.expect("snapshot").pending, 1);

    backend.set_online(true);
    let snapshot = wait_for(&handle, |s| s.connected && s.pending == 0).await;

    assert_eq!(snapshot.square_count(), 1);
    assert!(snapshot.columns.iter().flatten().all(|view| !view.unsynced));
    assert_eq!(backend.stored_ids(), vec![2]);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn probe_failures_flip_the_indicator() {
    let backend = FakeBackend::new();
    let handle = spawn_session(&backend, 20);
    wait_for(&handle, |s| s.connected && s.last_probe_at.is_some()).await;

    backend.set_online(false);
    let snapshot = wait_for(&handle, |s| !s.connected).await;
    assert!(!snapshot.syncing);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn subscribers_see_added_squares() {
    let backend = FakeBackend::new();
    let handle = spawn_session(&backend, 60_000);
    let mut events = handle.subscribe();

    let outcome = handle.add_square().await.expect("add");
    let added = outcome.square().expect("square");

    let seen = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let SyncEvent::SquareAdded { square, unsynced } =
                events.recv().await.expect("event stream open")
            {
                return (square, unsynced);
            }
        }
    })
    .await
    .expect("event in time");
    assert_eq!(seen, (added, false));
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn reset_and_reload_go_through_the_session() {
    let backend = FakeBackend::with_squares(&[1, 2, 3]);
    let handle = spawn_session(&backend, 60_000);

    assert!(handle.reset().await.expect("reset"));
    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.square_count(), 0);
    assert_eq!(snapshot.next_id, SquareId::FIRST);

    backend.insert(crate::test_support::square(9, shared::domain::Color::Purple));
    assert!(handle.reload().await.expect("reload"));
    assert_eq!(handle.snapshot().await.expect("snapshot").next_id, SquareId(10));

    let report = handle.reconcile().await.expect("reconcile");
    assert_eq!(report, Some(SyncReport::default()));
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn manual_reload_that_reconnects_flushes_queue() {
    let backend = FakeBackend::new();
    backend.set_online(false);
    let handle = spawn_session(&backend, 60_000);

    let outcome = handle.add_square().await.expect("add");
    assert!(matches!(outcome, AddOutcome::Queued(_)));

    backend.set_online(true);
    assert!(handle.reload().await.expect("reload"));

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert!(snapshot.connected);
    assert_eq!(snapshot.pending, 0);
    assert_eq!(backend.stored_ids(), vec![2]);
    handle.shutdown().await.expect("shutdown");
}
