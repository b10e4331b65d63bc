use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::store::{MemoryTreeStore, TreeStore};
use crate::{Error, ParamRow};

mod refresh;

/// Wraps a [MemoryTreeStore], counting the queries issued against it, and
/// optionally failing them.
#[derive(Default)]
struct CountingStore {
    inner: MemoryTreeStore,
    mtime_calls: AtomicUsize,
    select_calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingStore {
    fn new(inner: MemoryTreeStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    fn mtime_calls(&self) -> usize {
        self.mtime_calls.load(Ordering::SeqCst)
    }

    fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::StorageError("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TreeStore for CountingStore {
    async fn tree_mtime(&self) -> Result<String, Error> {
        self.mtime_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.tree_mtime().await
    }

    async fn select_tree(&self) -> Result<Vec<ParamRow>, Error> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.select_tree().await
    }
}
