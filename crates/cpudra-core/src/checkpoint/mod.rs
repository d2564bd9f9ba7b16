mod storage;
mod store;

pub use storage::{CheckpointStorage, FileStorage};
pub use store::{CHECKPOINT_KEY, CHECKPOINT_VERSION, CheckpointStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint is corrupted: {0}")]
    StorageCorrupt(String),
    #[error("checkpoint storage is unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
}

impl From<serde_json::Error> for CheckpointError {
    fn from(e: serde_json::Error) -> Self {
        Self::StorageCorrupt(e.to_string())
    }
}
