mod cpu;
mod decoder;
mod resolve;

pub use cpu::{
    CpuConfig, CpuSharing, SharingStrategy, SpacePartitioningConfig, TimeSliceInterval,
    TimeSlicingConfig,
};
pub use decoder::{CONFIG_API_VERSION, CPU_CONFIG_KIND, ConfigDecoder, JsonConfigDecoder};
pub use resolve::{OpaqueDeviceConfig, ResolvedConfigs, resolve_opaque_configs};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is not allowed for the {strategy} sharing strategy")]
    UnexpectedStrategyConfig {
        strategy: SharingStrategy,
        field: &'static str,
    },
    #[error("partition count has to be at least 1")]
    ZeroPartitionCount,
    #[error("strategy {actual} was configured, but a {requested} config was requested")]
    StrategyMismatch {
        actual: SharingStrategy,
        requested: SharingStrategy,
    },
    #[error("{0} config is missing, the config was not normalized")]
    MissingStrategyConfig(SharingStrategy),
}

/// All configuration kinds understood by this driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceConfig {
    Cpu(CpuConfig),
}

impl DeviceConfig {
    /// Configuration applied to requests that no attached config covers.
    pub fn default_config() -> Self {
        DeviceConfig::Cpu(CpuConfig::default())
    }
}
