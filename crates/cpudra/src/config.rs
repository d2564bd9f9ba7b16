use std::path::PathBuf;

use crate::common::cli::CommonOpts;
use crate::common::error::error;
use crate::discovery::ClassifiedCpuSets;

pub const CDI_VENDOR: &str = crate::DRIVER_NAME;
pub const CDI_CLASS: &str = "cpu";
pub const CDI_COMMON_DEVICE_NAME: &str = "common";

pub const DEFAULT_CDI_ROOT: &str = "/etc/cdi";
pub const DEFAULT_PLUGIN_DIR: &str = "/var/lib/kubelet/plugins/manager.cpu.com";

/// Runtime settings of the driver, assembled from the command line.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub node_name: String,
    pub cdi_root: PathBuf,
    pub plugin_dir: PathBuf,
    pub claims_dir: Option<PathBuf>,
    pub cpus: ClassifiedCpuSets,
}

impl DriverConfig {
    pub fn from_opts(opts: CommonOpts) -> crate::Result<Self> {
        let Some(node_name) = opts.node_name.filter(|name| !name.is_empty()) else {
            return error("Node name has to be set (--node-name or NODE_NAME)".to_string());
        };
        Ok(Self {
            node_name,
            cdi_root: opts.cdi_root,
            plugin_dir: opts.plugin_dir,
            claims_dir: opts.claims_dir,
            cpus: ClassifiedCpuSets {
                reserved: opts.reserved_cpus,
                shared: opts.shared_cpus,
                allocatable: opts.allocatable_cpus,
            },
        })
    }
}
