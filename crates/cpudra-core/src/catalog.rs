//! Devices that can be referenced by allocation results on this node.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::Map;

/// Kind of a CPU as partitioned by the node administrator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CpuClass {
    Reserved,
    Shared,
    Allocatable,
}

impl CpuClass {
    pub const ALL: [CpuClass; 3] = [CpuClass::Reserved, CpuClass::Shared, CpuClass::Allocatable];

    pub fn name(&self) -> &'static str {
        match self {
            CpuClass::Reserved => "reserved",
            CpuClass::Shared => "shared",
            CpuClass::Allocatable => "allocatable",
        }
    }
}

impl Display for CpuClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeviceAttribute {
    Int(i64),
    String(String),
    Bool(bool),
}

/// Description of a single device published by the driver.
///
/// The class flags are exposed as boolean attributes as well, but the class
/// itself is stored once, which keeps exactly one of them set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    name: String,
    class: CpuClass,
    attributes: Map<String, DeviceAttribute>,
}

impl DeviceDescriptor {
    pub fn new(name: String, class: CpuClass, mut attributes: Map<String, DeviceAttribute>) -> Self {
        for flag in CpuClass::ALL {
            attributes.insert(flag.name().to_string(), DeviceAttribute::Bool(flag == class));
        }
        Self {
            name,
            class,
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> CpuClass {
        self.class
    }

    pub fn attributes(&self) -> &Map<String, DeviceAttribute> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&DeviceAttribute> {
        self.attributes.get(name)
    }
}

/// Immutable mapping from device name to its descriptor.
#[derive(Debug, Default, Clone)]
pub struct AllocatableDevices {
    devices: Map<String, DeviceDescriptor>,
}

impl AllocatableDevices {
    pub fn lookup(&self, device: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(device)
    }

    #[inline]
    pub fn contains(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.values()
    }
}

impl FromIterator<DeviceDescriptor> for AllocatableDevices {
    fn from_iter<I: IntoIterator<Item = DeviceDescriptor>>(iter: I) -> Self {
        Self {
            devices: iter
                .into_iter()
                .map(|device| (device.name.clone(), device))
                .collect(),
        }
    }
}
