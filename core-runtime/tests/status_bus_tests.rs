//! Status bus behaviour across tasks

use core_runtime::events::{
    progress_fraction, CloudSyncError, StatusBus, SyncErrorKind, SyncState, SyncStatus,
};
use std::time::Duration;

#[tokio::test]
async fn test_subscriber_on_other_task_sees_every_snapshot_in_order() {
    let bus = StatusBus::new(32);
    let mut subscription = bus.subscribe(true);

    let collector = tokio::spawn(async move {
        let mut states = Vec::new();
        while let Ok(status) = subscription.recv().await {
            let done = status.state == SyncState::Failed;
            states.push(status);
            if done {
                break;
            }
        }
        states
    });

    for (current, total) in [(0, 0), (10, 100), (55, 100), (100, 100)] {
        bus.publish(SyncStatus::syncing(progress_fraction(current, total)));
    }
    bus.publish(SyncStatus::failed(CloudSyncError::new(
        SyncErrorKind::Server,
        "HTTP 503",
    )));

    let states = tokio::time::timeout(Duration::from_secs(1), collector)
        .await
        .expect("collector finished")
        .expect("collector did not panic");

    let progress: Vec<f64> = states
        .iter()
        .filter(|s| s.is_syncing())
        .map(|s| s.progress)
        .collect();
    assert_eq!(states[0], SyncStatus::idle());
    assert_eq!(progress, vec![0.0, 0.1, 0.55, 1.0]);
    assert_eq!(
        states.last().and_then(|s| s.failure()).map(|e| e.kind),
        Some(SyncErrorKind::Server)
    );
}

#[tokio::test]
async fn test_late_subscriber_gets_latest_snapshot_only() {
    let bus = StatusBus::default();
    bus.publish(SyncStatus::syncing(0.2));
    bus.publish(SyncStatus::syncing(0.7));

    let mut subscription = bus.subscribe(true);

    assert_eq!(subscription.recv().await.unwrap(), SyncStatus::syncing(0.7));
    assert!(subscription.try_recv().is_none());
}
