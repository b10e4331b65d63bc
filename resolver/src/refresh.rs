use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Span};

use crate::index::{build_indexes, ContextIndexes};
use crate::snapshot::SnapshotManager;
use crate::store::TreeStore;
use crate::tree::{build_tree, clone_for_context, mark_common};
use crate::{Error, Param, ParamRow};

/// What a single [Refresher::update] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The store marker was not newer than the published one.
    UpToDate,
    /// A new generation was published.
    Published { generation: u64, mtime: String },
}

/// Turns rows into a classified tree and its context indexes.
///
/// The indexes are read from a context view of the tree, the canonical tree
/// itself is returned unchanged for publication.
pub fn build_generation(rows: Vec<ParamRow>) -> Result<(Arc<Param>, ContextIndexes), Error> {
    let mut root = build_tree(rows)?;
    mark_common(&mut root);
    let root = Arc::new(root);

    let view = clone_for_context(&root);
    let indexes = build_indexes(&view)?;

    Ok((root, indexes))
}

/// Keeps a [SnapshotManager] in sync with a [TreeStore].
///
/// At most one update runs at a time, no matter whether it was started by the
/// background task or by a direct call to [Refresher::update].
pub struct Refresher<S> {
    store: S,
    snapshots: Arc<SnapshotManager>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<S> Refresher<S>
where
    S: TreeStore + 'static,
{
    pub fn new(store: S, snapshots: Arc<SnapshotManager>) -> Self {
        Self {
            store,
            snapshots,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Asks the store for its current marker and compares it with the
    /// published one. Returns whether the store is newer, and the marker.
    #[instrument(skip(self), err)]
    pub async fn ready_to_update(&self) -> Result<(bool, String), Error> {
        let mtime = self.store.tree_mtime().await?;
        let ready = self.snapshots.is_stale(&mtime);
        Ok((ready, mtime))
    }

    /// Runs one refresh attempt. Does nothing beyond the staleness check if
    /// the published snapshot is current.
    ///
    /// On error the previously published snapshot stays in place.
    #[instrument(skip(self), fields(tree.mtime = tracing::field::Empty), err)]
    pub async fn update(&self) -> Result<UpdateOutcome, Error> {
        let _in_flight = self.in_flight.lock().await;

        let (ready, mtime) = self.ready_to_update().await?;
        if !ready {
            debug!(tree.mtime = %mtime, "tree is up to date");
            return Ok(UpdateOutcome::UpToDate);
        }

        let _refreshing = self.snapshots.begin_refresh();
        Span::current().record("tree.mtime", mtime.as_str());
        info!("updating tree");

        let rows = self.store.select_tree().await?;
        let span = Span::current();
        let (root, indexes) = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            build_generation(rows)
        })
        .await??;

        Ok(match self.snapshots.publish(mtime, root, indexes) {
            Some(snapshot) => UpdateOutcome::Published {
                generation: snapshot.generation(),
                mtime: snapshot.mtime().to_string(),
            },
            None => UpdateOutcome::UpToDate,
        })
    }

    /// Performs the first load. A service must not start serving if this
    /// fails.
    #[instrument(skip(self), err)]
    pub async fn load_initial(&self) -> Result<(), Error> {
        self.update().await?;

        match self.snapshots.current() {
            Some(_) => Ok(()),
            None => Err(Error::StorageError(
                "initial load did not publish a tree".to_string(),
            )),
        }
    }

    /// Spawns the background task, which calls [Refresher::update] every
    /// `interval` until the returned handle is shut down. Errors are logged
    /// and retried on the next tick.
    pub fn start_background_refresh(self: Arc<Self>, interval: Duration) -> RefreshHandle {
        let token = CancellationToken::new();

        let task = tokio::spawn({
            let token = token.clone();
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately, and the initial load
                // already happened.
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    tokio::select! {
                        _ = token.cancelled() => break,
                        res = self.update() => match res {
                            Ok(UpdateOutcome::UpToDate) => {}
                            Ok(UpdateOutcome::Published { .. }) => {}
                            Err(e) => error!(err = %e, "failed to update tree"),
                        }
                    }
                }

                debug!("background refresh stopped");
            }
        });

        RefreshHandle { token, task }
    }
}

/// Controls the background refresh task.
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task, abandoning an update in progress, and waits for it to
    /// exit.
    pub async fn shutdown(self) -> Result<(), Error> {
        self.token.cancel();
        self.task.await?;
        Ok(())
    }
}
