//! Projection of the consensus stream into the datastore.

use std::fmt;

use quartz_storage::StoreError;

pub mod balance;
pub mod explorer;
pub mod lock;
pub mod stats;
pub mod ucos;
pub mod undo;
pub mod view;

pub use balance::Balance;
pub use explorer::Explorer;
pub use lock::LockedOutputRecord;
pub use stats::{ExplorerState, NetworkStats};
pub use ucos::{OutputLock, UnspentOutputRecord};

#[derive(Debug)]
pub enum ProjectionError {
    /// Datastore I/O failed; the change may be retried.
    Store(StoreError),
    /// A stored value does not decode; the projection is corrupt.
    Codec(String),
    /// The projection disagrees with the consensus stream.
    Invariant(String),
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::Store(err) => write!(f, "{err}"),
            ProjectionError::Codec(message) => write!(f, "{message}"),
            ProjectionError::Invariant(message) => write!(f, "invariant violation: {message}"),
        }
    }
}

impl std::error::Error for ProjectionError {}

impl From<StoreError> for ProjectionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Backend(message) => ProjectionError::Store(StoreError::Backend(message)),
            StoreError::Codec(message) => ProjectionError::Codec(message),
        }
    }
}

impl ProjectionError {
    /// Only datastore I/O failures are worth retrying; everything else
    /// means the projection can no longer be trusted.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProjectionError::Store(_))
    }
}
