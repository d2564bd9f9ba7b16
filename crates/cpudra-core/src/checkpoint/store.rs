use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointError, CheckpointStorage};
use crate::prepared::PreparedClaims;

pub const CHECKPOINT_KEY: &str = "checkpoint.json";
pub const CHECKPOINT_VERSION: &str = "v1";

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CheckpointData {
    prepared_claims: PreparedClaims,
}

#[derive(Serialize)]
struct CheckpointRecord<'a> {
    version: &'a str,
    checksum: u64,
    data: &'a CheckpointData,
}

/// The data section is decoded only after the version has been checked.
#[derive(Deserialize)]
struct RawCheckpointRecord {
    version: String,
    checksum: u64,
    data: serde_json::Value,
}

fn checksum(data: &CheckpointData) -> Result<u64, CheckpointError> {
    let bytes = serde_json::to_vec(data)?;
    Ok(fxhash::hash64(&bytes))
}

/// Durable snapshot of the prepared claims table.
///
/// The table is always loaded and saved as a whole. Callers are responsible
/// for serializing load-modify-save sequences.
pub struct CheckpointStore {
    storage: Box<dyn CheckpointStorage>,
    key: String,
}

impl CheckpointStore {
    pub fn new(storage: Box<dyn CheckpointStorage>) -> Self {
        Self::with_key(storage, CHECKPOINT_KEY)
    }

    pub fn with_key(storage: Box<dyn CheckpointStorage>, key: &str) -> Self {
        Self {
            storage,
            key: key.to_string(),
        }
    }

    /// Writes an empty table unless a checkpoint already exists.
    pub fn initialize(&self) -> Result<(), CheckpointError> {
        if self.storage.list_keys()?.iter().any(|k| *k == self.key) {
            log::debug!("Found existing checkpoint {}", self.key);
            return Ok(());
        }
        log::debug!("Creating empty checkpoint {}", self.key);
        self.save(&PreparedClaims::default())
    }

    pub fn load(&self) -> Result<PreparedClaims, CheckpointError> {
        let bytes = self.storage.read(&self.key)?;
        let record: RawCheckpointRecord = serde_json::from_slice(&bytes)?;
        if record.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::StorageCorrupt(format!(
                "unsupported checkpoint version {}, expected {}",
                record.version, CHECKPOINT_VERSION
            )));
        }
        let data: CheckpointData = serde_json::from_value(record.data)?;
        let expected = checksum(&data)?;
        if record.checksum != expected {
            return Err(CheckpointError::StorageCorrupt(format!(
                "checksum mismatch (stored {}, computed {})",
                record.checksum, expected
            )));
        }
        Ok(data.prepared_claims)
    }

    pub fn save(&self, claims: &PreparedClaims) -> Result<(), CheckpointError> {
        let data = CheckpointData {
            prepared_claims: claims.clone(),
        };
        let record = CheckpointRecord {
            version: CHECKPOINT_VERSION,
            checksum: checksum(&data)?,
            data: &data,
        };
        let bytes = serde_json::to_vec(&record)?;
        self.storage.write(&self.key, &bytes)?;
        Ok(())
    }
}
