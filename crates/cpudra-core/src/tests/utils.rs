use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use derive_builder::Builder;

use crate::catalog::{AllocatableDevices, CpuClass, DeviceDescriptor};
use crate::checkpoint::{CheckpointStorage, CheckpointStore};
use crate::claim::{
    AllocationConfigSource, AllocationResult, ClaimUid, DeviceAllocationConfiguration,
    DeviceRequestAllocationResult, OpaqueDeviceConfiguration, ResourceClaim,
};
use crate::config::{ConfigDecoder, DeviceConfig, JsonConfigDecoder, TimeSliceInterval};
use crate::edits::ClaimEditWriter;
use crate::prepared::PreparedDevices;
use crate::{DRIVER_NAME, DeviceState, Map};

/// In-memory durable storage shared by clones, used to simulate restarts.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<Map<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CheckpointStorage for MemoryStorage {
    fn read(&self, key: &str) -> std::io::Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, key.to_string()))
    }

    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk is full"));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn list_keys(&self) -> std::io::Result<Vec<String>> {
        let mut keys: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[derive(Default)]
pub struct EditLog {
    pub written: Vec<ClaimUid>,
    pub deleted: Vec<ClaimUid>,
    pub fail_write: bool,
    pub fail_delete: bool,
}

#[derive(Clone, Default)]
pub struct RecordingEditWriter {
    pub log: Arc<Mutex<EditLog>>,
}

impl ClaimEditWriter for RecordingEditWriter {
    fn claim_device_ids(&self, claim_uid: &ClaimUid, device: &str) -> Vec<String> {
        vec![format!("test/cpu={claim_uid}-{device}")]
    }

    fn write_claim_edits(
        &self,
        claim_uid: &ClaimUid,
        _devices: &PreparedDevices,
    ) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_write {
            anyhow::bail!("cannot write spec");
        }
        log.written.push(claim_uid.clone());
        Ok(())
    }

    fn delete_claim_edits(&self, claim_uid: &ClaimUid) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_delete {
            anyhow::bail!("cannot delete spec");
        }
        log.deleted.push(claim_uid.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CountingDecoder {
    pub calls: Arc<AtomicUsize>,
}

impl CountingDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConfigDecoder for CountingDecoder {
    fn decode(&self, parameters: &serde_json::Value) -> anyhow::Result<DeviceConfig> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        JsonConfigDecoder.decode(parameters)
    }
}

pub fn catalog() -> AllocatableDevices {
    [
        ("cpu-0", CpuClass::Allocatable),
        ("cpu-1", CpuClass::Reserved),
        ("cpu-2", CpuClass::Allocatable),
        ("cpu-3", CpuClass::Shared),
    ]
    .into_iter()
    .map(|(name, class)| DeviceDescriptor::new(name.to_string(), class, Map::new()))
    .collect()
}

pub struct TestEnv {
    pub state: DeviceState,
    pub storage: MemoryStorage,
    pub writer: RecordingEditWriter,
    pub decoder: CountingDecoder,
}

impl TestEnv {
    pub fn new() -> Self {
        let storage = MemoryStorage::default();
        let writer = RecordingEditWriter::default();
        let decoder = CountingDecoder::default();
        let state = Self::create_state(&storage, &writer, &decoder);
        TestEnv {
            state,
            storage,
            writer,
            decoder,
        }
    }

    fn create_state(
        storage: &MemoryStorage,
        writer: &RecordingEditWriter,
        decoder: &CountingDecoder,
    ) -> DeviceState {
        DeviceState::new(
            DRIVER_NAME,
            catalog(),
            CheckpointStore::new(Box::new(storage.clone())),
            Box::new(writer.clone()),
            Box::new(decoder.clone()),
        )
        .unwrap()
    }

    /// Replaces the state by a fresh one sharing the same durable storage.
    pub fn restart(&mut self) {
        self.state = Self::create_state(&self.storage, &self.writer, &self.decoder);
    }

    pub fn edit_log(&self) -> std::sync::MutexGuard<'_, EditLog> {
        self.writer.log.lock().unwrap()
    }
}

#[derive(Builder, Clone)]
#[builder(pattern = "owned", derive(Clone))]
pub struct ClaimConfig {
    #[builder(setter(into))]
    uid: String,
    #[builder(default = "true")]
    allocated: bool,
    #[builder(default)]
    results: Vec<DeviceRequestAllocationResult>,
    #[builder(default)]
    configs: Vec<DeviceAllocationConfiguration>,
}

impl ClaimConfigBuilder {
    pub fn result(mut self, request: &str, device: &str) -> Self {
        self.results
            .get_or_insert_with(Vec::new)
            .push(DeviceRequestAllocationResult {
                request: request.to_string(),
                pool: "node-1".to_string(),
                device: device.to_string(),
            });
        self
    }

    pub fn config(mut self, config: DeviceAllocationConfiguration) -> Self {
        self.configs.get_or_insert_with(Vec::new).push(config);
        self
    }

    pub fn finish(self) -> ResourceClaim {
        let ClaimConfig {
            uid,
            allocated,
            results,
            configs,
        } = self.build().unwrap();
        ResourceClaim {
            uid: ClaimUid::new(uid),
            namespace: "default".to_string(),
            name: "claim".to_string(),
            allocation: allocated.then_some(AllocationResult {
                results,
                config: configs,
            }),
        }
    }
}

pub fn claim(uid: &str) -> ClaimConfigBuilder {
    ClaimConfigBuilder::default().uid(uid)
}

pub fn cpu_config_params(interval: Option<TimeSliceInterval>) -> serde_json::Value {
    let mut params = serde_json::json!({
        "apiVersion": "manager.cpu.com/v1alpha1",
        "kind": "CpuConfig",
    });
    if let Some(interval) = interval {
        params["sharing"] = serde_json::json!({
            "strategy": "TimeSlicing",
            "timeSlicingConfig": {"interval": interval},
        });
    }
    params
}

pub fn opaque_config(parameters: serde_json::Value) -> OpaqueDeviceConfiguration {
    OpaqueDeviceConfiguration {
        driver: DRIVER_NAME.to_string(),
        parameters,
    }
}

fn config(
    source: AllocationConfigSource,
    requests: &[&str],
    parameters: serde_json::Value,
) -> DeviceAllocationConfiguration {
    DeviceAllocationConfiguration {
        source,
        requests: requests.iter().map(|r| r.to_string()).collect(),
        opaque: Some(opaque_config(parameters)),
    }
}

pub fn class_config(requests: &[&str], parameters: serde_json::Value) -> DeviceAllocationConfiguration {
    config(AllocationConfigSource::FromClass, requests, parameters)
}

pub fn claim_config(requests: &[&str], parameters: serde_json::Value) -> DeviceAllocationConfiguration {
    config(AllocationConfigSource::FromClaim, requests, parameters)
}
