use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::claim::ClaimUid;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DeviceStateError {
    #[error("claim {0} is not yet allocated")]
    ClaimNotAllocated(ClaimUid),
    #[error("requested device is not allocatable: {0}")]
    DeviceNotAllocatable(String),
    #[error("invalid config source: {0}")]
    UnsupportedConfigSource(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfigKind(String),
    #[error("invalid CPU config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("device {0} is allocated to more than one request of the claim")]
    ConflictingDeviceEdits(String),
    #[error("unable to sync from checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("unable to sync to checkpoint: {0}")]
    CheckpointWrite(#[source] CheckpointError),
    #[error("unable to create CDI spec file for claim {claim_uid}: {source}")]
    EditPersist {
        claim_uid: ClaimUid,
        #[source]
        source: anyhow::Error,
    },
    #[error("unable to delete CDI spec file for claim {claim_uid}: {source}")]
    EditDelete {
        claim_uid: ClaimUid,
        #[source]
        source: anyhow::Error,
    },
}
