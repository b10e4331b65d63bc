use std::path::PathBuf;
use url::Url;

use super::{MemoryTreeStore, SqliteTreeStore, TreeStore};
use crate::Error;

/// Constructs a new instance of a [TreeStore] from an URI.
///
/// The following URIs are supported:
/// - `memory:`
///   Uses an empty in-memory implementation.
/// - `sqlite:`
///   Uses an in-memory SQLite database.
/// - `sqlite:///absolute/path/to/tree.db`
///   Uses a SQLite database file, created if missing.
pub async fn from_addr(uri: &str) -> Result<Box<dyn TreeStore>, Error> {
    let url = Url::parse(uri)
        .map_err(|e| Error::StorageError(format!("unable to parse url: {}", e)))?;

    let tree_store: Box<dyn TreeStore> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::StorageError("invalid url".to_string()));
            }
            Box::<MemoryTreeStore>::default()
        }
        "sqlite" => {
            if url.has_host() {
                return Err(Error::StorageError("no host allowed".to_string()));
            }

            if url.path().is_empty() {
                Box::new(SqliteTreeStore::new_temporary()?)
            } else {
                Box::new(SqliteTreeStore::new(PathBuf::from(url.path())).await?)
            }
        }
        _ => {
            return Err(Error::StorageError(format!(
                "unknown scheme: {}",
                url.scheme()
            )))
        }
    };
    Ok(tree_store)
}

#[cfg(test)]
mod tests {
    use super::from_addr;
    use lazy_static::lazy_static;
    use rstest::rstest;
    use tempfile::TempDir;

    lazy_static! {
        static ref TMPDIR_SQLITE_1: TempDir = TempDir::new().unwrap();
        static ref TMPDIR_SQLITE_2: TempDir = TempDir::new().unwrap();
    }

    #[rstest]
    /// This uses an unsupported scheme.
    #[case::unsupported_scheme("http://foo.example/test", false)]
    /// This correctly sets the scheme, and doesn't set a path.
    #[case::memory_valid("memory://", true)]
    /// This sets a memory url host to `foo`
    #[case::memory_invalid_host("memory://foo", false)]
    /// This sets a memory url path to "/", which is invalid.
    #[case::memory_invalid_root_path("memory:///", false)]
    /// This configures sqlite in memory.
    #[case::sqlite_valid_temporary("sqlite://", true)]
    /// This configures sqlite with /, which should fail.
    #[case::sqlite_invalid_root("sqlite:///", false)]
    /// This configures sqlite with a host, not path, which should fail.
    #[case::sqlite_invalid_host("sqlite://foo.example", false)]
    /// This configures sqlite with a valid path, which should succeed.
    #[case::sqlite_valid_path(&format!("sqlite://{}/tree.db", &TMPDIR_SQLITE_1.path().to_str().unwrap()), true)]
    /// This configures sqlite with a host, and a valid path, which should fail.
    #[case::sqlite_invalid_host_with_valid_path(&format!("sqlite://foo.example{}/tree.db", &TMPDIR_SQLITE_2.path().to_str().unwrap()), false)]
    #[tokio::test]
    async fn test_from_addr_tokio(#[case] uri_str: &str, #[case] exp_succeed: bool) {
        if exp_succeed {
            from_addr(uri_str).await.expect("should succeed");
        } else {
            assert!(from_addr(uri_str).await.is_err(), "should fail");
        }
    }
}
