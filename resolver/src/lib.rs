mod errors;
mod param;

pub mod fixtures;
pub mod index;
pub mod refresh;
pub mod serialize;
pub mod snapshot;
pub mod store;
pub mod tree;

pub use errors::{Error, IndexError, StructureError, SymlinkError};
pub use param::{ContentType, Param, ParamRow};
pub use refresh::{Refresher, UpdateOutcome};
pub use snapshot::{SnapshotManager, TreeSnapshot};

#[cfg(test)]
mod tests;
