//! Resource claims as handed over by the protocol layer.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClaimUid(String);

impl ClaimUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClaimUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClaimUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaim {
    pub uid: ClaimUid,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// `None` until the scheduler has made an allocation decision.
    #[serde(default)]
    pub allocation: Option<AllocationResult>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    #[serde(default)]
    pub results: Vec<DeviceRequestAllocationResult>,
    #[serde(default)]
    pub config: Vec<DeviceAllocationConfiguration>,
}

/// One device assigned to satisfy one named request of the claim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequestAllocationResult {
    pub request: String,
    pub pool: String,
    pub device: String,
}

/// Where a configuration attachment comes from.
///
/// Unknown sources are kept verbatim so that they can be rejected when the
/// configuration is resolved instead of failing the whole claim decode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum AllocationConfigSource {
    FromClass,
    FromClaim,
    Other(String),
}

impl From<String> for AllocationConfigSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "FromClass" => AllocationConfigSource::FromClass,
            "FromClaim" => AllocationConfigSource::FromClaim,
            _ => AllocationConfigSource::Other(value),
        }
    }
}

impl From<AllocationConfigSource> for String {
    fn from(value: AllocationConfigSource) -> Self {
        match value {
            AllocationConfigSource::FromClass => "FromClass".to_string(),
            AllocationConfigSource::FromClaim => "FromClaim".to_string(),
            AllocationConfigSource::Other(value) => value,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAllocationConfiguration {
    pub source: AllocationConfigSource,
    /// Requests the configuration applies to, empty means all of them.
    #[serde(default)]
    pub requests: Vec<String>,
    #[serde(default)]
    pub opaque: Option<OpaqueDeviceConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueDeviceConfiguration {
    pub driver: String,
    pub parameters: serde_json::Value,
}
