//! Kubelet facing side of the plugin: batches of claim references are turned
//! into transactions on the device state.

use std::collections::BTreeMap;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cpudra_core::catalog::DeviceDescriptor;
use cpudra_core::checkpoint::{CheckpointStore, FileStorage};
use cpudra_core::claim::{ClaimUid, ResourceClaim};
use cpudra_core::config::JsonConfigDecoder;
use cpudra_core::prepared::{Device, PreparedClaims};
use cpudra_core::{DeviceState, Map};

use crate::cdi::CdiHandler;
use crate::config::DriverConfig;
use crate::discovery::enumerate_all_possible_devices;

/// Reference to a claim as sent by the kubelet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRef {
    pub namespace: String,
    pub name: String,
    pub uid: ClaimUid,
}

impl ClaimRef {
    pub fn from_claim(claim: &ResourceClaim) -> Self {
        Self {
            namespace: claim.namespace.clone(),
            name: claim.name.clone(),
            uid: claim.uid.clone(),
        }
    }
}

/// Parses `<namespace>/<name>=<uid>`.
impl FromStr for ClaimRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = s
            .split_once('=')
            .and_then(|(path, uid)| path.split_once('/').map(|(ns, name)| (ns, name, uid)));
        match parsed {
            Some((namespace, name, uid))
                if !namespace.is_empty() && !name.is_empty() && !uid.is_empty() =>
            {
                Ok(Self {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    uid: ClaimUid::new(uid),
                })
            }
            _ => anyhow::bail!("Invalid claim reference '{s}', expected <namespace>/<name>=<uid>"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodePrepareResourcesRequest {
    pub claims: Vec<ClaimRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePrepareResourceResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodePrepareResourcesResponse {
    pub claims: BTreeMap<ClaimUid, NodePrepareResourceResponse>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeUnprepareResourcesRequest {
    pub claims: Vec<ClaimRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUnprepareResourceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeUnprepareResourcesResponse {
    pub claims: BTreeMap<ClaimUid, NodeUnprepareResourceResponse>,
}

/// Source of the full claim objects referenced by kubelet requests.
pub trait ClaimFetcher: Send + Sync {
    fn fetch(&self, namespace: &str, name: &str) -> anyhow::Result<ResourceClaim>;
}

/// Reads claims stored as `<root>/<namespace>/<name>.json`.
pub struct DirectoryClaimFetcher {
    root: PathBuf,
}

impl DirectoryClaimFetcher {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn claim_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{name}.json"))
    }
}

impl ClaimFetcher for DirectoryClaimFetcher {
    fn fetch(&self, namespace: &str, name: &str) -> anyhow::Result<ResourceClaim> {
        let path = self.claim_path(namespace, name);
        let data = std::fs::read(&path)
            .with_context(|| format!("Cannot read claim file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Cannot parse claim file {}", path.display()))
    }
}

#[derive(Default)]
pub struct MemoryClaimFetcher {
    claims: Map<(String, String), ResourceClaim>,
}

impl MemoryClaimFetcher {
    pub fn insert(&mut self, claim: ResourceClaim) {
        self.claims
            .insert((claim.namespace.clone(), claim.name.clone()), claim);
    }
}

impl FromIterator<ResourceClaim> for MemoryClaimFetcher {
    fn from_iter<I: IntoIterator<Item = ResourceClaim>>(iter: I) -> Self {
        let mut fetcher = MemoryClaimFetcher::default();
        for claim in iter {
            fetcher.insert(claim);
        }
        fetcher
    }
}

impl ClaimFetcher for MemoryClaimFetcher {
    fn fetch(&self, namespace: &str, name: &str) -> anyhow::Result<ResourceClaim> {
        self.claims
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Claim {namespace}/{name} not found"))
    }
}

/// Claims are looked up in `config.claims_dir` when it is set, otherwise the
/// driver only knows the claims it is given.
pub fn default_claim_fetcher(config: &DriverConfig) -> Box<dyn ClaimFetcher> {
    match &config.claims_dir {
        Some(dir) => Box::new(DirectoryClaimFetcher::new(dir)),
        None => Box::new(MemoryClaimFetcher::default()),
    }
}

pub struct Driver {
    state: DeviceState,
    fetcher: Box<dyn ClaimFetcher>,
}

impl Driver {
    pub fn new(state: DeviceState, fetcher: Box<dyn ClaimFetcher>) -> Self {
        Self { state, fetcher }
    }

    /// Builds the whole plugin state for this node.
    ///
    /// Creates the plugin directory, enumerates the CPU devices, writes the
    /// common CDI spec and opens the checkpoint.
    pub fn create(config: &DriverConfig, fetcher: Box<dyn ClaimFetcher>) -> crate::Result<Self> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o750)
            .create(&config.plugin_dir)?;

        let allocatable = enumerate_all_possible_devices(&config.cpus)?;

        let cdi = CdiHandler::new(&config.cdi_root, &config.node_name)?;
        cdi.write_common_edits()?;

        let storage = FileStorage::open(&config.plugin_dir)?;
        let state = DeviceState::new(
            crate::DRIVER_NAME,
            allocatable,
            CheckpointStore::new(Box::new(storage)),
            Box::new(cdi),
            Box::new(JsonConfigDecoder),
        )?;
        Ok(Self::new(state, fetcher))
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Devices published for this node, ordered by name.
    pub fn resources(&self) -> Vec<&DeviceDescriptor> {
        let mut devices: Vec<_> = self.state.allocatable().iter().collect();
        devices.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        devices
    }

    pub fn prepared_claims(&self) -> crate::Result<PreparedClaims> {
        Ok(self.state.prepared_claims()?)
    }

    pub fn node_prepare_resources(
        &self,
        request: NodePrepareResourcesRequest,
    ) -> NodePrepareResourcesResponse {
        log::info!("Preparing {} claim(s)", request.claims.len());
        let claims = request
            .claims
            .into_iter()
            .map(|claim| {
                let response = self.node_prepare_resource(&claim);
                (claim.uid, response)
            })
            .collect();
        NodePrepareResourcesResponse { claims }
    }

    fn node_prepare_resource(&self, claim: &ClaimRef) -> NodePrepareResourceResponse {
        let resource_claim = match self.fetcher.fetch(&claim.namespace, &claim.name) {
            Ok(resource_claim) => resource_claim,
            Err(error) => {
                log::warn!(
                    "Cannot fetch claim {}/{}: {error:#}",
                    claim.namespace,
                    claim.name
                );
                return NodePrepareResourceResponse {
                    devices: Vec::new(),
                    error: Some(format!(
                        "failed to fetch ResourceClaim {} in namespace {}",
                        claim.name, claim.namespace
                    )),
                };
            }
        };
        if resource_claim.uid != claim.uid {
            return NodePrepareResourceResponse {
                devices: Vec::new(),
                error: Some(format!(
                    "ResourceClaim {}/{} has UID {}, expected {}",
                    claim.namespace, claim.name, resource_claim.uid, claim.uid
                )),
            };
        }

        match self.state.prepare(&resource_claim) {
            Ok(devices) => {
                log::debug!("Claim {} prepared: {devices:?}", claim.uid);
                NodePrepareResourceResponse {
                    devices,
                    error: None,
                }
            }
            Err(error) => {
                log::warn!("Preparing claim {} failed: {error}", claim.uid);
                NodePrepareResourceResponse {
                    devices: Vec::new(),
                    error: Some(format!(
                        "error preparing devices for claim {}: {error}",
                        claim.uid
                    )),
                }
            }
        }
    }

    pub fn node_unprepare_resources(
        &self,
        request: NodeUnprepareResourcesRequest,
    ) -> NodeUnprepareResourcesResponse {
        log::info!("Unpreparing {} claim(s)", request.claims.len());
        let claims = request
            .claims
            .into_iter()
            .map(|claim| {
                let error = self.state.unprepare(&claim.uid).err().map(|error| {
                    log::warn!("Unpreparing claim {} failed: {error}", claim.uid);
                    format!("error unpreparing devices for claim {}: {error}", claim.uid)
                });
                (claim.uid, NodeUnprepareResourceResponse { error })
            })
            .collect();
        NodeUnprepareResourcesResponse { claims }
    }
}
