use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::config::ConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingStrategy {
    TimeSlicing,
    SpacePartitioning,
}

impl Display for SharingStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SharingStrategy::TimeSlicing => f.write_str("TimeSlicing"),
            SharingStrategy::SpacePartitioning => f.write_str("SpacePartitioning"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSliceInterval {
    #[default]
    Default,
    Short,
    Medium,
    Long,
}

impl Display for TimeSliceInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeSliceInterval::Default => "Default",
            TimeSliceInterval::Short => "Short",
            TimeSliceInterval::Medium => "Medium",
            TimeSliceInterval::Long => "Long",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeSlicingConfig {
    #[serde(default)]
    pub interval: TimeSliceInterval,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpacePartitioningConfig {
    pub partition_count: u32,
}

impl Default for SpacePartitioningConfig {
    fn default() -> Self {
        Self { partition_count: 1 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CpuSharing {
    pub strategy: SharingStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slicing_config: Option<TimeSlicingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_partitioning_config: Option<SpacePartitioningConfig>,
}

impl CpuSharing {
    pub fn time_slicing(interval: TimeSliceInterval) -> Self {
        Self {
            strategy: SharingStrategy::TimeSlicing,
            time_slicing_config: Some(TimeSlicingConfig { interval }),
            space_partitioning_config: None,
        }
    }

    pub fn space_partitioning(partition_count: u32) -> Self {
        Self {
            strategy: SharingStrategy::SpacePartitioning,
            time_slicing_config: None,
            space_partitioning_config: Some(SpacePartitioningConfig { partition_count }),
        }
    }

    pub fn time_slicing_config(&self) -> Result<&TimeSlicingConfig, ConfigError> {
        if self.strategy != SharingStrategy::TimeSlicing {
            return Err(ConfigError::StrategyMismatch {
                actual: self.strategy,
                requested: SharingStrategy::TimeSlicing,
            });
        }
        self.time_slicing_config
            .as_ref()
            .ok_or(ConfigError::MissingStrategyConfig(SharingStrategy::TimeSlicing))
    }

    pub fn space_partitioning_config(&self) -> Result<&SpacePartitioningConfig, ConfigError> {
        if self.strategy != SharingStrategy::SpacePartitioning {
            return Err(ConfigError::StrategyMismatch {
                actual: self.strategy,
                requested: SharingStrategy::SpacePartitioning,
            });
        }
        self.space_partitioning_config
            .as_ref()
            .ok_or(ConfigError::MissingStrategyConfig(
                SharingStrategy::SpacePartitioning,
            ))
    }

    fn normalize(&mut self) {
        match self.strategy {
            SharingStrategy::TimeSlicing => {
                self.time_slicing_config.get_or_insert_with(Default::default);
            }
            SharingStrategy::SpacePartitioning => {
                self.space_partitioning_config
                    .get_or_insert_with(Default::default);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy {
            SharingStrategy::TimeSlicing => {
                if self.space_partitioning_config.is_some() {
                    return Err(ConfigError::UnexpectedStrategyConfig {
                        strategy: self.strategy,
                        field: "spacePartitioningConfig",
                    });
                }
                self.time_slicing_config()?;
            }
            SharingStrategy::SpacePartitioning => {
                if self.time_slicing_config.is_some() {
                    return Err(ConfigError::UnexpectedStrategyConfig {
                        strategy: self.strategy,
                        field: "timeSlicingConfig",
                    });
                }
                if self.space_partitioning_config()?.partition_count == 0 {
                    return Err(ConfigError::ZeroPartitionCount);
                }
            }
        }
        Ok(())
    }
}

/// Opaque configuration of CPU devices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CpuConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing: Option<CpuSharing>,
}

impl CpuConfig {
    /// Fills in implied defaults.
    pub fn normalize(&mut self) {
        if let Some(sharing) = &mut self.sharing {
            sharing.normalize();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.sharing {
            Some(sharing) => sharing.validate(),
            None => Ok(()),
        }
    }
}
