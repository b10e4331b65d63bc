use async_trait::async_trait;

use crate::{Error, ParamRow};

mod from_addr;
mod memory;
mod sqlite;

pub use self::from_addr::from_addr;
pub use self::memory::MemoryTreeStore;
pub use self::sqlite::SqliteTreeStore;

/// The relational store holding the parameter tree.
///
/// Mutations happen elsewhere (admin side), the resolver only ever reads.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Returns the latest modification marker of the whole tree, taken from
    /// the change log. Markers compare lexically. An empty log yields an
    /// empty marker.
    async fn tree_mtime(&self) -> Result<String, Error>;

    /// Returns every non-deleted row, ordered by path.
    async fn select_tree(&self) -> Result<Vec<ParamRow>, Error>;
}

#[async_trait]
impl<A> TreeStore for A
where
    A: AsRef<dyn TreeStore> + Send + Sync,
{
    async fn tree_mtime(&self) -> Result<String, Error> {
        self.as_ref().tree_mtime().await
    }

    async fn select_tree(&self) -> Result<Vec<ParamRow>, Error> {
        self.as_ref().select_tree().await
    }
}
