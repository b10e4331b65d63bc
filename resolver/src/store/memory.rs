use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use super::TreeStore;
use crate::{Error, ParamRow};

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<i64, ParamRow>,
    /// max(mtime) of every change ever applied, deletions included.
    mtime: String,
}

/// An in-process [TreeStore].
///
/// Every mutation takes the modification marker to record, mirroring the
/// change log of the relational store. Markers never move backwards.
#[derive(Clone, Debug, Default)]
pub struct MemoryTreeStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given rows.
    pub fn with_rows(rows: impl IntoIterator<Item = ParamRow>, mtime: &str) -> Self {
        let store = Self::new();
        store.replace(rows, mtime);
        store
    }

    /// Replaces the whole content of the store.
    pub fn replace(&self, rows: impl IntoIterator<Item = ParamRow>, mtime: &str) {
        let mut inner = self.inner.write();
        inner.rows = rows.into_iter().map(|r| (r.id, r)).collect();
        Self::touch(&mut inner, mtime);
    }

    /// Inserts a row, or replaces the row with the same id.
    pub fn upsert(&self, row: ParamRow, mtime: &str) {
        let mut inner = self.inner.write();
        inner.rows.insert(row.id, row);
        Self::touch(&mut inner, mtime);
    }

    /// Removes a row. Returns whether it existed.
    pub fn delete(&self, id: i64, mtime: &str) -> bool {
        let mut inner = self.inner.write();
        let existed = inner.rows.remove(&id).is_some();
        Self::touch(&mut inner, mtime);
        existed
    }

    fn touch(inner: &mut Inner, mtime: &str) {
        if mtime > inner.mtime.as_str() {
            inner.mtime = mtime.to_string();
        }
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    #[instrument(skip(self))]
    async fn tree_mtime(&self) -> Result<String, Error> {
        Ok(self.inner.read().mtime.clone())
    }

    #[instrument(skip(self))]
    async fn select_tree(&self) -> Result<Vec<ParamRow>, Error> {
        let mut rows: Vec<ParamRow> = self.inner.read().rows.values().cloned().collect();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryTreeStore;
    use crate::fixtures::{row, COMMON_TREE_ROWS, TREE_MTIME_1, TREE_MTIME_2};
    use crate::store::TreeStore;
    use crate::ContentType;

    #[tokio::test]
    async fn empty() {
        let store = MemoryTreeStore::new();
        assert_eq!("", store.tree_mtime().await.unwrap());
        assert!(store.select_tree().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_are_ordered_by_path() {
        let mut rows = COMMON_TREE_ROWS.clone();
        rows.reverse();
        let store = MemoryTreeStore::with_rows(rows, TREE_MTIME_1);

        let paths: Vec<_> = store
            .select_tree()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(
            vec!["/", "/app", "/app/db", "/app/db/host", "/app/empty", "/app/port"],
            paths
        );
    }

    #[tokio::test]
    async fn mutations_advance_mtime() {
        let store = MemoryTreeStore::with_rows(COMMON_TREE_ROWS.clone(), TREE_MTIME_1);
        assert_eq!(TREE_MTIME_1, store.tree_mtime().await.unwrap());

        store.upsert(
            row(7, Some(1), "new", "/new", ContentType::Text, Some("x")),
            TREE_MTIME_2,
        );
        assert_eq!(TREE_MTIME_2, store.tree_mtime().await.unwrap());

        // an older marker never moves the log backwards
        assert!(store.delete(7, TREE_MTIME_1));
        assert_eq!(TREE_MTIME_2, store.tree_mtime().await.unwrap());
        assert!(!store.delete(7, TREE_MTIME_2));
    }
}
