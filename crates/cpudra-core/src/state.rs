use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Set;
use crate::apply::{PerDeviceContainerEdits, apply_config};
use crate::catalog::AllocatableDevices;
use crate::checkpoint::CheckpointStore;
use crate::claim::{ClaimUid, DeviceRequestAllocationResult, ResourceClaim};
use crate::common::error::DeviceStateError;
use crate::config::{ConfigDecoder, resolve_opaque_configs};
use crate::edits::ClaimEditWriter;
use crate::prepared::{Device, PreparedClaims, PreparedDevice, PreparedDevices};

/// Everything that is mutated by a transaction lives behind the state lock.
struct Transactional {
    checkpoint: CheckpointStore,
    edits: Box<dyn ClaimEditWriter>,
}

/// Prepares and unprepares claims on this node.
///
/// All transactions are serialized by a single lock. Each one loads the whole
/// checkpoint, applies its change and saves the whole checkpoint again, so the
/// persisted table is the only source of truth and survives restarts.
pub struct DeviceState {
    driver_name: String,
    allocatable: AllocatableDevices,
    decoder: Box<dyn ConfigDecoder>,
    inner: Mutex<Transactional>,
}

impl DeviceState {
    pub fn new(
        driver_name: &str,
        allocatable: AllocatableDevices,
        checkpoint: CheckpointStore,
        edits: Box<dyn ClaimEditWriter>,
        decoder: Box<dyn ConfigDecoder>,
    ) -> crate::Result<Self> {
        checkpoint.initialize()?;
        Ok(Self {
            driver_name: driver_name.to_string(),
            allocatable,
            decoder,
            inner: Mutex::new(Transactional { checkpoint, edits }),
        })
    }

    pub fn allocatable(&self) -> &AllocatableDevices {
        &self.allocatable
    }

    /// A panic inside a transaction happens before the checkpoint is saved,
    /// so the persisted state is still consistent and the lock can be reused.
    fn lock(&self) -> MutexGuard<'_, Transactional> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn prepared_claims(&self) -> crate::Result<PreparedClaims> {
        Ok(self.lock().checkpoint.load()?)
    }

    pub fn prepare(&self, claim: &ResourceClaim) -> crate::Result<Vec<Device>> {
        let inner = self.lock();
        let claim_uid = &claim.uid;

        let mut prepared_claims = inner.checkpoint.load()?;
        if let Some(prepared) = prepared_claims.get(claim_uid) {
            log::debug!("Claim {claim_uid} is already prepared");
            return Ok(prepared.devices());
        }

        let prepared = self.prepare_devices(inner.edits.as_ref(), claim)?;

        inner
            .edits
            .write_claim_edits(claim_uid, &prepared)
            .map_err(|source| DeviceStateError::EditPersist {
                claim_uid: claim_uid.clone(),
                source,
            })?;

        let devices = prepared.devices();
        prepared_claims.insert(claim_uid.clone(), prepared);
        inner
            .checkpoint
            .save(&prepared_claims)
            .map_err(DeviceStateError::CheckpointWrite)?;

        log::info!("Claim {claim_uid} prepared with {} device(s)", devices.len());
        Ok(devices)
    }

    pub fn unprepare(&self, claim_uid: &ClaimUid) -> crate::Result<()> {
        let inner = self.lock();

        let mut prepared_claims = inner.checkpoint.load()?;
        let Some(prepared) = prepared_claims.get(claim_uid) else {
            log::debug!("Claim {claim_uid} is not prepared, nothing to do");
            return Ok(());
        };

        self.unprepare_devices(claim_uid, prepared)?;

        inner
            .edits
            .delete_claim_edits(claim_uid)
            .map_err(|source| DeviceStateError::EditDelete {
                claim_uid: claim_uid.clone(),
                source,
            })?;

        prepared_claims.remove(claim_uid);
        inner
            .checkpoint
            .save(&prepared_claims)
            .map_err(DeviceStateError::CheckpointWrite)?;

        log::info!("Claim {claim_uid} unprepared");
        Ok(())
    }

    fn prepare_devices(
        &self,
        edits: &dyn ClaimEditWriter,
        claim: &ResourceClaim,
    ) -> crate::Result<PreparedDevices> {
        let allocation = claim
            .allocation
            .as_ref()
            .ok_or_else(|| DeviceStateError::ClaimNotAllocated(claim.uid.clone()))?;

        // Each device yields one CDI device named after it, so it may back
        // only a single result of the claim.
        let mut seen = Set::new();
        for result in &allocation.results {
            if !self.allocatable.contains(&result.device) {
                return Err(DeviceStateError::DeviceNotAllocatable(result.device.clone()));
            }
            if !seen.insert(result.device.as_str()) {
                return Err(DeviceStateError::ConflictingDeviceEdits(result.device.clone()));
            }
        }

        let configs =
            resolve_opaque_configs(self.decoder.as_ref(), &self.driver_name, &allocation.config)?;
        log::debug!(
            "Claim {} resolved {} config(s) for {} result(s)",
            claim.uid,
            configs.len(),
            allocation.results.len()
        );

        // Group results by the config that governs them, so every config is
        // normalized, validated and applied exactly once.
        let mut groups: Vec<Vec<&DeviceRequestAllocationResult>> = vec![Vec::new(); configs.len()];
        for result in &allocation.results {
            groups[configs.match_request(&result.request)].push(result);
        }

        let mut per_device_edits = PerDeviceContainerEdits::new();
        for (config, results) in configs.iter().zip(groups) {
            if results.is_empty() {
                continue;
            }
            per_device_edits.extend(apply_config(config.config.clone(), &results)?);
        }

        let devices = allocation
            .results
            .iter()
            .map(|result| PreparedDevice {
                device: Device {
                    request_names: vec![result.request.clone()],
                    pool_name: result.pool.clone(),
                    device_name: result.device.clone(),
                    cdi_device_ids: edits.claim_device_ids(&claim.uid, &result.device),
                },
                container_edits: per_device_edits
                    .get(&result.device)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        Ok(PreparedDevices::new(devices))
    }

    /// Releases device specific resources held by a prepared claim.
    ///
    /// CPUs need no reconfiguration, so there is nothing to release yet.
    fn unprepare_devices(
        &self,
        _claim_uid: &ClaimUid,
        _devices: &PreparedDevices,
    ) -> crate::Result<()> {
        Ok(())
    }
}
