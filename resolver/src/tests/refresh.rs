use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

use super::CountingStore;
use crate::fixtures::{
    row, COMMON_TREE_ROWS, CONTEXT_TREE_ROWS, SECRET_HASH, TREE_MTIME_1, TREE_MTIME_2,
};
use crate::refresh::{Refresher, UpdateOutcome};
use crate::snapshot::{SnapshotManager, SnapshotState};
use crate::store::MemoryTreeStore;
use crate::{ContentType, Error, StructureError};

fn refresher_with(rows: Vec<crate::ParamRow>) -> (Arc<Refresher<CountingStore>>, MemoryTreeStore) {
    let memory = MemoryTreeStore::with_rows(rows, TREE_MTIME_1);
    let refresher = Refresher::new(
        CountingStore::new(memory.clone()),
        Arc::new(SnapshotManager::new()),
    );
    (Arc::new(refresher), memory)
}

/// Waits until the published generation reaches `generation`.
async fn wait_for_generation(snapshots: &SnapshotManager, generation: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if snapshots.current().map(|s| s.generation()) == Some(generation) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("generation must be published in time");
}

/// Scenario B: an unchanged marker only costs the staleness query.
#[tokio::test]
async fn unchanged_marker_only_checks_staleness() {
    let (refresher, _) = refresher_with(COMMON_TREE_ROWS.clone());

    assert_eq!(
        UpdateOutcome::Published {
            generation: 1,
            mtime: TREE_MTIME_1.to_string()
        },
        refresher.update().await.unwrap()
    );
    let first = refresher.snapshots().current().unwrap();
    assert_eq!(1, refresher.store().mtime_calls());
    assert_eq!(1, refresher.store().select_calls());

    assert_eq!(UpdateOutcome::UpToDate, refresher.update().await.unwrap());
    assert_eq!(2, refresher.store().mtime_calls());
    assert_eq!(1, refresher.store().select_calls(), "no row load");

    let second = refresher.snapshots().current().unwrap();
    assert!(Arc::ptr_eq(&first, &second), "no publish");
    assert!(Arc::ptr_eq(first.root(), second.root()));
}

/// Scenario C: a service added in the store becomes visible to the
/// credential lookup after the next refresh, and not before.
#[tokio::test]
async fn service_visible_after_refresh() {
    let (refresher, memory) = refresher_with(COMMON_TREE_ROWS.clone());
    refresher.load_initial().await.unwrap();
    assert_eq!(None, refresher.snapshots().lookup_service_credential("billing"));

    memory.replace(CONTEXT_TREE_ROWS.clone(), TREE_MTIME_2);
    assert_eq!(
        None,
        refresher.snapshots().lookup_service_credential("billing"),
        "not visible before the refresh"
    );

    refresher.update().await.unwrap();
    assert_eq!(
        Some(SECRET_HASH.as_bytes()),
        refresher
            .snapshots()
            .lookup_service_credential("billing")
            .as_deref()
    );
}

#[tokio::test]
async fn failed_refresh_keeps_snapshot() {
    let (refresher, memory) = refresher_with(COMMON_TREE_ROWS.clone());
    refresher.load_initial().await.unwrap();
    let published = refresher.snapshots().current().unwrap();

    // a row pointing at a parent that doesn't exist
    memory.upsert(
        row(42, Some(4242), "orphan", "/nowhere/orphan", ContentType::Text, None),
        TREE_MTIME_2,
    );
    assert_eq!(
        Err(Error::Structure(StructureError::ParentNotFound {
            path: "/nowhere/orphan".into(),
            parent_id: 4242
        })),
        refresher.update().await
    );
    assert!(Arc::ptr_eq(
        &published,
        &refresher.snapshots().current().unwrap()
    ));
    assert_eq!(SnapshotState::Ready, refresher.snapshots().state());

    // a transient store error is reported the same way
    refresher.store().set_failing(true);
    assert!(matches!(
        refresher.update().await,
        Err(Error::StorageError(_))
    ));
    assert!(Arc::ptr_eq(
        &published,
        &refresher.snapshots().current().unwrap()
    ));

    // and the next attempt after the fix goes through
    refresher.store().set_failing(false);
    memory.delete(42, "2024-03-01 10:10:00");
    assert!(matches!(
        refresher.update().await,
        Ok(UpdateOutcome::Published { generation: 2, .. })
    ));
}

#[tokio::test]
async fn concurrent_updates_load_once() {
    let (refresher, _) = refresher_with(COMMON_TREE_ROWS.clone());

    let (a, b) = tokio::join!(refresher.update(), refresher.update());
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, UpdateOutcome::Published { .. }));

    assert_eq!(UpdateOutcome::UpToDate, outcomes[0]);
    assert!(matches!(outcomes[1], UpdateOutcome::Published { generation: 1, .. }));
    assert_eq!(1, refresher.store().select_calls());
}

#[tokio::test]
async fn background_refresh_picks_up_changes() {
    let (refresher, memory) = refresher_with(COMMON_TREE_ROWS.clone());
    refresher.load_initial().await.unwrap();

    let handle = refresher
        .clone()
        .start_background_refresh(Duration::from_millis(10));

    memory.replace(CONTEXT_TREE_ROWS.clone(), TREE_MTIME_2);
    wait_for_generation(refresher.snapshots(), 2).await;
    assert_eq!(
        Some(TREE_MTIME_2.to_string()),
        refresher.snapshots().current_mtime()
    );

    // errors are retried on the next tick
    refresher.store().set_failing(true);
    memory.upsert(
        row(100, Some(1), "late", "/late", ContentType::Text, Some("1")),
        "2024-03-01 10:10:00",
    );
    let calls = refresher.store().mtime_calls();
    tokio::time::timeout(Duration::from_secs(5), async {
        while refresher.store().mtime_calls() < calls + 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("must keep polling");
    assert_eq!(2, refresher.snapshots().current().unwrap().generation());

    refresher.store().set_failing(false);
    wait_for_generation(refresher.snapshots(), 3).await;

    handle.shutdown().await.expect("must shut down");
}

#[tokio::test]
async fn shutdown_stops_polling() {
    let (refresher, _) = refresher_with(COMMON_TREE_ROWS.clone());
    refresher.load_initial().await.unwrap();

    let handle = refresher
        .clone()
        .start_background_refresh(Duration::from_millis(5));
    let token = handle.cancellation_token();
    handle.shutdown().await.unwrap();
    assert!(token.is_cancelled());

    let calls = refresher.store().mtime_calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls, refresher.store().mtime_calls());
}

/// Logs from building a generation on the blocking pool carry the marker
/// of the update that triggered it.
#[tokio::test]
#[traced_test]
async fn build_logs_carry_update_span() {
    let (refresher, _) = refresher_with(vec![
        row(1, None, "", "/", ContentType::Null, None),
        row(2, Some(1), "onlineconf", "/onlineconf", ContentType::Null, None),
        row(3, Some(2), "datacenter", "/onlineconf/datacenter", ContentType::Null, None),
        row(
            4,
            Some(3),
            "dc1",
            "/onlineconf/datacenter/dc1",
            ContentType::Text,
            Some("not-a-network"),
        ),
    ]);
    assert!(refresher.load_initial().await.is_err());

    logs_assert(|lines: &[&str]| {
        match lines
            .iter()
            .any(|l| l.contains("build_indexes") && l.contains(TREE_MTIME_1))
        {
            true => Ok(()),
            false => Err("index error logged outside of the update span".to_string()),
        }
    });
}
