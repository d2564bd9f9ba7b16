use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::claim::ClaimUid;

/// Runtime instructions exposing a device inside a container.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEdits {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_nodes: Vec<DeviceNode>,
}

impl ContainerEdits {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.device_nodes.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNode {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

/// Device as reported back to the kubelet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub request_names: Vec<String>,
    pub pool_name: String,
    pub device_name: String,
    #[serde(rename = "cdiDeviceIDs")]
    pub cdi_device_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDevice {
    pub device: Device,
    pub container_edits: ContainerEdits,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PreparedDevices(Vec<PreparedDevice>);

impl PreparedDevices {
    pub fn new(devices: Vec<PreparedDevice>) -> Self {
        Self(devices)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.0.iter().map(|pd| pd.device.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreparedDevice> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Claims ordered by UID, which keeps the checkpoint serialization stable.
pub type PreparedClaims = BTreeMap<ClaimUid, PreparedDevices>;
