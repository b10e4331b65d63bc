use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::index::{ContextIndexes, Datacenter, Group, Services};
use crate::Param;

/// One published generation of the tree, with the indexes derived from it
/// and the store marker it was loaded at.
#[derive(Debug)]
pub struct TreeSnapshot {
    generation: u64,
    mtime: String,
    root: Arc<Param>,
    datacenters: Vec<Datacenter>,
    groups: Vec<Group>,
    services: Services,
}

impl TreeSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mtime(&self) -> &str {
        &self.mtime
    }

    pub fn root(&self) -> &Arc<Param> {
        &self.root
    }

    pub fn datacenters(&self) -> &[Datacenter] {
        &self.datacenters
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The context of a client, as seen by this generation.
    pub fn client_context(&self, host: &str, ip: Option<&IpAddr>) -> ClientContext {
        ClientContext {
            datacenter: ip.and_then(|ip| {
                self.datacenters
                    .iter()
                    .find(|dc| dc.contains(ip))
                    .map(|dc| dc.name().to_string())
            }),
            groups: self
                .groups
                .iter()
                .filter(|g| g.matches(host))
                .map(|g| g.name().to_string())
                .collect(),
        }
    }
}

/// Which datacenter and groups a client belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ClientContext {
    pub datacenter: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotState {
    /// Nothing was ever published.
    #[default]
    Empty,
    /// The first load is in progress.
    Loading,
    /// A snapshot is published and no refresh is running.
    Ready,
    /// A snapshot is published and a refresh is running.
    Refreshing,
}

/// Holds the currently published [TreeSnapshot].
///
/// Readers take the read lock only long enough to clone the [Arc], so they
/// never wait for a refresh, which builds the next generation off-lock and
/// only takes the write lock to swap it in.
#[derive(Debug, Default)]
pub struct SnapshotManager {
    current: RwLock<Option<Arc<TreeSnapshot>>>,
    state: Mutex<SnapshotState>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SnapshotState {
        *self.state.lock()
    }

    /// Returns the published snapshot, if any. Everything read from it belongs
    /// to the same generation.
    pub fn current(&self) -> Option<Arc<TreeSnapshot>> {
        self.current.read().clone()
    }

    pub fn current_tree(&self) -> Option<Arc<Param>> {
        self.current.read().as_ref().map(|s| s.root.clone())
    }

    pub fn current_mtime(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.mtime.clone())
    }

    pub fn current_datacenters(&self) -> Vec<Datacenter> {
        self.current
            .read()
            .as_ref()
            .map(|s| s.datacenters.clone())
            .unwrap_or_default()
    }

    pub fn current_groups(&self) -> Vec<Group> {
        self.current
            .read()
            .as_ref()
            .map(|s| s.groups.clone())
            .unwrap_or_default()
    }

    /// Looks up the stored credential hash of a service.
    /// Returns None if the service is unknown or nothing is published yet.
    pub fn lookup_service_credential(&self, service: &str) -> Option<Bytes> {
        self.current
            .read()
            .as_ref()
            .and_then(|s| s.services.get(service).cloned())
    }

    pub fn client_context(&self, host: &str, ip: Option<&IpAddr>) -> ClientContext {
        self.current()
            .map(|s| s.client_context(host, ip))
            .unwrap_or_default()
    }

    /// Whether a store marker is strictly newer than the published one.
    /// Any marker is newer than an empty manager.
    pub fn is_stale(&self, store_mtime: &str) -> bool {
        match self.current.read().as_ref() {
            None => true,
            Some(s) => store_mtime > s.mtime.as_str(),
        }
    }

    /// Swaps in a new generation. The marker, tree and indexes are replaced as
    /// one unit.
    ///
    /// Returns None and keeps the current snapshot if `mtime` is not strictly
    /// newer than the published one.
    pub fn publish(
        &self,
        mtime: String,
        root: Arc<Param>,
        indexes: ContextIndexes,
    ) -> Option<Arc<TreeSnapshot>> {
        let mut current = self.current.write();

        let generation = match current.as_ref() {
            Some(prev) if mtime.as_str() <= prev.mtime.as_str() => {
                debug!(tree.mtime = %mtime, published.mtime = %prev.mtime, "not newer, keeping snapshot");
                return None;
            }
            Some(prev) => prev.generation + 1,
            None => 1,
        };

        let snapshot = Arc::new(TreeSnapshot {
            generation,
            mtime,
            root,
            datacenters: indexes.datacenters,
            groups: indexes.groups,
            services: indexes.services,
        });
        *current = Some(snapshot.clone());
        drop(current);

        info!(tree.mtime = %snapshot.mtime, generation, "published tree");
        Some(snapshot)
    }

    /// Marks a refresh as running until the returned guard is dropped.
    pub(crate) fn begin_refresh(&self) -> RefreshGuard<'_> {
        let mut state = self.state.lock();
        *state = match *state {
            SnapshotState::Empty | SnapshotState::Loading => SnapshotState::Loading,
            SnapshotState::Ready | SnapshotState::Refreshing => SnapshotState::Refreshing,
        };
        RefreshGuard { manager: self }
    }
}

pub(crate) struct RefreshGuard<'a> {
    manager: &'a SnapshotManager,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        let published = self.manager.current.read().is_some();
        let mut state = self.manager.state.lock();
        *state = if published {
            SnapshotState::Ready
        } else {
            SnapshotState::Empty
        };
    }
}
