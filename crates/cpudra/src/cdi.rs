//! CDI spec files that tell the container runtime how to expose prepared
//! devices.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cpudra_core::claim::ClaimUid;
use cpudra_core::common::fsutils::{remove_if_exists, write_atomic};
use cpudra_core::edits::ClaimEditWriter;
use cpudra_core::prepared::{ContainerEdits, PreparedDevices};

use crate::config::{CDI_CLASS, CDI_COMMON_DEVICE_NAME, CDI_VENDOR};

pub const CDI_VERSION: &str = "0.5.0";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CdiSpec {
    pub cdi_version: String,
    pub kind: String,
    pub devices: Vec<CdiDevice>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CdiDevice {
    pub name: String,
    pub container_edits: ContainerEdits,
}

fn cdi_kind() -> String {
    format!("{CDI_VENDOR}/{CDI_CLASS}")
}

fn qualified_name(device: &str) -> String {
    format!("{}={device}", cdi_kind())
}

fn claim_device_name(claim_uid: &ClaimUid, device: &str) -> String {
    format!("{claim_uid}-{device}")
}

/// Writes and removes the CDI specs of this driver inside `cdi_root`.
pub struct CdiHandler {
    cdi_root: PathBuf,
    node_name: String,
}

impl CdiHandler {
    pub fn new(cdi_root: &Path, node_name: &str) -> crate::Result<Self> {
        std::fs::create_dir_all(cdi_root)?;
        Ok(Self {
            cdi_root: cdi_root.to_path_buf(),
            node_name: node_name.to_string(),
        })
    }

    pub fn cdi_root(&self) -> &Path {
        &self.cdi_root
    }

    fn spec_path(&self, suffix: &str) -> PathBuf {
        self.cdi_root
            .join(format!("{CDI_VENDOR}-{CDI_CLASS}_{suffix}.json"))
    }

    pub fn common_spec_path(&self) -> PathBuf {
        self.spec_path(CDI_COMMON_DEVICE_NAME)
    }

    /// The UID becomes part of a file name, so it must not contain a path
    /// separator.
    pub fn claim_spec_path(&self, claim_uid: &ClaimUid) -> anyhow::Result<PathBuf> {
        let uid = claim_uid.as_str();
        if uid.is_empty() || uid.contains(['/', '\\', '\0']) {
            anyhow::bail!("Claim UID '{}' cannot be used in a CDI spec file name", uid.escape_debug());
        }
        Ok(self.spec_path(uid))
    }

    fn write_spec(&self, path: &Path, devices: Vec<CdiDevice>) -> anyhow::Result<()> {
        let spec = CdiSpec {
            cdi_version: CDI_VERSION.to_string(),
            kind: cdi_kind(),
            devices,
        };
        let data = serde_json::to_vec_pretty(&spec)?;
        write_atomic(path, &data)
            .with_context(|| format!("Cannot write CDI spec {}", path.display()))
    }

    /// Edits injected into every container that uses a device of this driver.
    pub fn write_common_edits(&self) -> anyhow::Result<()> {
        let edits = ContainerEdits {
            env: vec![
                format!("CPU_NODE_NAME={}", self.node_name),
                format!("DRA_RESOURCE_DRIVER_NAME={}", crate::DRIVER_NAME),
            ],
            device_nodes: Vec::new(),
        };
        let path = self.common_spec_path();
        self.write_spec(
            &path,
            vec![CdiDevice {
                name: CDI_COMMON_DEVICE_NAME.to_string(),
                container_edits: edits,
            }],
        )?;
        log::debug!("Common CDI spec written to {}", path.display());
        Ok(())
    }
}

impl ClaimEditWriter for CdiHandler {
    fn claim_device_ids(&self, claim_uid: &ClaimUid, device: &str) -> Vec<String> {
        vec![
            qualified_name(CDI_COMMON_DEVICE_NAME),
            qualified_name(&claim_device_name(claim_uid, device)),
        ]
    }

    fn write_claim_edits(
        &self,
        claim_uid: &ClaimUid,
        devices: &PreparedDevices,
    ) -> anyhow::Result<()> {
        let devices = devices
            .iter()
            .map(|prepared| CdiDevice {
                name: claim_device_name(claim_uid, &prepared.device.device_name),
                container_edits: prepared.container_edits.clone(),
            })
            .collect();
        self.write_spec(&self.claim_spec_path(claim_uid)?, devices)
    }

    fn delete_claim_edits(&self, claim_uid: &ClaimUid) -> anyhow::Result<()> {
        let path = self.claim_spec_path(claim_uid)?;
        remove_if_exists(&path)
            .with_context(|| format!("Cannot remove CDI spec {}", path.display()))
    }
}
