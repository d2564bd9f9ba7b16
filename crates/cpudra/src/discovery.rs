//! Turns the administrator's partition of node CPUs into published devices.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cpudra_core::Map;
use cpudra_core::Set;
use cpudra_core::catalog::{AllocatableDevices, CpuClass, DeviceAttribute, DeviceDescriptor};

use crate::common::cpuset::CpuSet;
use crate::common::error::error;

#[derive(Debug, Clone, Default)]
pub struct ClassifiedCpuSets {
    pub reserved: CpuSet,
    pub shared: CpuSet,
    pub allocatable: CpuSet,
}

impl ClassifiedCpuSets {
    pub fn get(&self, class: CpuClass) -> &CpuSet {
        match class {
            CpuClass::Reserved => &self.reserved,
            CpuClass::Shared => &self.shared,
            CpuClass::Allocatable => &self.allocatable,
        }
    }
}

pub fn cpu_device_name(cpu: u32) -> String {
    format!("cpu-{cpu}")
}

/// Creates one device per CPU of every class.
///
/// The result only depends on the input partition, so a restarted plugin
/// publishes identical devices.
pub fn enumerate_all_possible_devices(cpus: &ClassifiedCpuSets) -> crate::Result<AllocatableDevices> {
    let mut seen = Set::new();
    let mut devices = Vec::new();
    for class in CpuClass::ALL {
        let set = cpus.get(class);
        for cpu in set.iter() {
            if !seen.insert(cpu) {
                return error(format!(
                    "CPU {cpu} is assigned to more than one class (found again in {class} CPUs)"
                ));
            }
        }
        devices.extend(enumerate_devices_for_class(class, set));
    }
    log::debug!("Enumerated {} CPU devices", devices.len());
    Ok(devices.into_iter().collect())
}

fn enumerate_devices_for_class(class: CpuClass, set: &CpuSet) -> Vec<DeviceDescriptor> {
    let uuids = generate_uuids(class.name(), set.len());
    set.iter()
        .zip(uuids)
        .map(|(cpu, uuid)| {
            let mut attributes = Map::new();
            attributes.insert("index".to_string(), DeviceAttribute::Int(cpu as i64));
            attributes.insert("uuid".to_string(), DeviceAttribute::String(uuid));
            attributes.insert("zone".to_string(), DeviceAttribute::Int(0));
            DeviceDescriptor::new(cpu_device_name(cpu), class, attributes)
        })
        .collect()
}

fn generate_uuids(seed: &str, count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(hash(seed) as u64);
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 16];
            rng.fill(&mut bytes);
            format!("cpu-{}", uuid::Uuid::from_bytes(bytes))
        })
        .collect()
}

fn hash(s: &str) -> i64 {
    s.chars()
        .fold(0i64, |h, c| h.wrapping_mul(31).wrapping_add(c as i64))
}
