use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::TreeStore;
use crate::{ContentType, Error, ParamRow};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS config_tree (
    ID          INTEGER PRIMARY KEY,
    Name        TEXT    NOT NULL,
    ParentID    INTEGER REFERENCES config_tree(ID),
    Path        TEXT    NOT NULL UNIQUE,
    Version     INTEGER NOT NULL DEFAULT 1,
    ContentType TEXT    NOT NULL,
    Value       TEXT,
    MTime       TEXT    NOT NULL,
    Deleted     INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS config_tree_log (
    ID          INTEGER PRIMARY KEY AUTOINCREMENT,
    NodeID      INTEGER NOT NULL,
    Version     INTEGER NOT NULL,
    ContentType TEXT    NOT NULL,
    Value       TEXT,
    MTime       TEXT    NOT NULL,
    Deleted     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS config_tree_log_mtime ON config_tree_log (MTime);
";

/// A [TreeStore] backed by SQLite.
///
/// The parameter table holds the current state of every node, the log table
/// one entry per change. Queries run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteTreeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTreeStore {
    /// Opens (and if needed initializes) the database at the given path.
    pub async fn new(path: PathBuf) -> Result<Self, Error> {
        if path == PathBuf::from("/") {
            return Err(Error::StorageError(
                "cowardly refusing to open / with sqlite".to_string(),
            ));
        }

        let conn = tokio::task::spawn_blocking(move || -> Result<_, rusqlite::Error> {
            let conn = Connection::open(path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a fresh in-memory database.
    pub fn new_temporary() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts or replaces a node and records the change in the log, in one
    /// transaction. The row's mtime becomes the log entry's marker.
    #[instrument(skip_all, fields(param.path = %row.path, tree.mtime = %row.mtime), err)]
    pub async fn write_row(&self, row: ParamRow) -> Result<(), Error> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<_, rusqlite::Error> {
            let mut conn = conn.lock();
            let txn = conn.transaction()?;
            txn.execute(
                "INSERT OR REPLACE INTO config_tree
                    (ID, Name, ParentID, Path, Version, ContentType, Value, MTime, Deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
                params![
                    row.id,
                    row.name,
                    row.parent_id,
                    row.path,
                    row.version,
                    row.content_type.as_str(),
                    row.value,
                    row.mtime,
                ],
            )?;
            txn.execute(
                "INSERT INTO config_tree_log (NodeID, Version, ContentType, Value, MTime)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    row.version,
                    row.content_type.as_str(),
                    row.value,
                    row.mtime,
                ],
            )?;
            txn.commit()
        })
        .await??;

        Ok(())
    }

    /// Marks a node as deleted and records the change in the log.
    /// Returns whether a live node with this id existed.
    #[instrument(skip(self), err)]
    pub async fn delete_row(&self, id: i64, mtime: String) -> Result<bool, Error> {
        let conn = self.conn.clone();
        let deleted = tokio::task::spawn_blocking(move || -> Result<_, rusqlite::Error> {
            let mut conn = conn.lock();
            let txn = conn.transaction()?;
            let current: Option<(i64, String)> = txn
                .query_row(
                    "SELECT Version, ContentType FROM config_tree WHERE ID = ?1 AND NOT Deleted",
                    params![id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;

            let Some((version, content_type)) = current else {
                return Ok(false);
            };

            txn.execute(
                "UPDATE config_tree SET Deleted = 1, Version = ?2, MTime = ?3 WHERE ID = ?1",
                params![id, version + 1, mtime],
            )?;
            txn.execute(
                "INSERT INTO config_tree_log (NodeID, Version, ContentType, Value, MTime, Deleted)
                 VALUES (?1, ?2, ?3, NULL, ?4, 1)",
                params![id, version + 1, content_type, mtime],
            )?;
            txn.commit()?;
            Ok(true)
        })
        .await??;

        Ok(deleted)
    }
}

#[async_trait]
impl TreeStore for SqliteTreeStore {
    #[instrument(skip(self), err)]
    async fn tree_mtime(&self) -> Result<String, Error> {
        let conn = self.conn.clone();
        let mtime = tokio::task::spawn_blocking(move || {
            conn.lock().query_row(
                "SELECT coalesce(max(MTime), '') FROM config_tree_log",
                [],
                |r| r.get::<_, String>(0),
            )
        })
        .await?
        .map_err(|e| {
            warn!(err=%e, "failed to query tree mtime");
            Error::StorageError(format!("failed to query tree mtime: {}", e))
        })?;

        Ok(mtime)
    }

    #[instrument(skip(self), err)]
    async fn select_tree(&self) -> Result<Vec<ParamRow>, Error> {
        let conn = self.conn.clone();
        let rows = tokio::task::spawn_blocking(move || -> Result<_, rusqlite::Error> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT ID, Name, Path, MTime, Version, ContentType, Value, ParentID
                 FROM config_tree
                 WHERE NOT Deleted
                 ORDER BY Path",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(ParamRow {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        path: r.get(2)?,
                        mtime: r.get(3)?,
                        version: r.get(4)?,
                        content_type: ContentType::from(r.get::<_, String>(5)?),
                        value: r.get(6)?,
                        parent_id: r.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
        .map_err(|e| {
            warn!(err=%e, "failed to select tree");
            Error::StorageError(format!("failed to select tree: {}", e))
        })?;

        Ok(rows)
    }
}
