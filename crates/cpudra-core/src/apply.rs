//! Derivation of container edits from a resolved configuration.

use crate::Map;
use crate::claim::DeviceRequestAllocationResult;
use crate::config::{ConfigError, CpuConfig, DeviceConfig, SharingStrategy};
use crate::prepared::ContainerEdits;

pub type PerDeviceContainerEdits = Map<String, ContainerEdits>;

/// Normalizes and validates `config` and computes the edits of every device
/// in `results`.
pub fn apply_config(
    config: DeviceConfig,
    results: &[&DeviceRequestAllocationResult],
) -> crate::Result<PerDeviceContainerEdits> {
    match config {
        DeviceConfig::Cpu(mut config) => {
            config.normalize();
            config.validate()?;
            let mut edits = PerDeviceContainerEdits::new();
            for result in results {
                edits.insert(result.device.clone(), cpu_device_edits(&config, &result.device)?);
            }
            Ok(edits)
        }
    }
}

/// `cpu-3` becomes `CPU_DEVICE_3`.
fn env_prefix(device: &str) -> String {
    let suffix = device.strip_prefix("cpu-").unwrap_or(device);
    format!("CPU_DEVICE_{}", suffix.replace('-', "_").to_uppercase())
}

fn cpu_device_edits(config: &CpuConfig, device: &str) -> Result<ContainerEdits, ConfigError> {
    let prefix = env_prefix(device);
    let mut env = vec![format!("{prefix}={device}")];

    if let Some(sharing) = &config.sharing {
        env.push(format!("{prefix}_SHARING_STRATEGY={}", sharing.strategy));
        match sharing.strategy {
            SharingStrategy::TimeSlicing => {
                let ts = sharing.time_slicing_config()?;
                env.push(format!("{prefix}_TIMESLICE_INTERVAL={}", ts.interval));
            }
            SharingStrategy::SpacePartitioning => {
                let sp = sharing.space_partitioning_config()?;
                env.push(format!("{prefix}_PARTITION_COUNT={}", sp.partition_count));
            }
        }
    }

    Ok(ContainerEdits {
        env,
        device_nodes: Vec::new(),
    })
}
