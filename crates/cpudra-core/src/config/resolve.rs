use crate::claim::{AllocationConfigSource, DeviceAllocationConfiguration};
use crate::common::error::DeviceStateError;
use crate::config::{ConfigDecoder, DeviceConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueDeviceConfig {
    /// Requests this config is restricted to, empty means all requests.
    pub requests: Vec<String>,
    pub config: DeviceConfig,
}

impl OpaqueDeviceConfig {
    pub fn applies_to(&self, request: &str) -> bool {
        self.requests.is_empty() || self.requests.iter().any(|r| r == request)
    }
}

/// Configs relevant for this driver, ordered from the lowest to the highest
/// precedence. The first item is always the driver default that applies to
/// all requests.
#[derive(Debug)]
pub struct ResolvedConfigs {
    configs: Vec<OpaqueDeviceConfig>,
}

impl ResolvedConfigs {
    fn new(mut configs: Vec<OpaqueDeviceConfig>) -> Self {
        configs.insert(
            0,
            OpaqueDeviceConfig {
                requests: Vec::new(),
                config: DeviceConfig::default_config(),
            },
        );
        Self { configs }
    }

    /// Returns the index of the config with the highest precedence that
    /// applies to `request`.
    pub fn match_request(&self, request: &str) -> usize {
        self.configs
            .iter()
            .rposition(|c| c.applies_to(request))
            .unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&OpaqueDeviceConfig> {
        self.configs.get(index)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpaqueDeviceConfig> {
        self.configs.iter()
    }
}

/// Collects and decodes the configs of `driver_name` in order of precedence.
///
/// Configs coming from the claim take precedence over configs coming from the
/// device class. Within one source, configs listed later take precedence over
/// configs listed earlier. Configs of other drivers are skipped, because one
/// request may be satisfiable by several drivers.
pub fn resolve_opaque_configs(
    decoder: &dyn ConfigDecoder,
    driver_name: &str,
    possible_configs: &[DeviceAllocationConfiguration],
) -> crate::Result<ResolvedConfigs> {
    let mut class_configs = Vec::new();
    let mut claim_configs = Vec::new();
    for config in possible_configs {
        match &config.source {
            AllocationConfigSource::FromClass => class_configs.push(config),
            AllocationConfigSource::FromClaim => claim_configs.push(config),
            AllocationConfigSource::Other(source) => {
                return Err(DeviceStateError::UnsupportedConfigSource(source.clone()));
            }
        }
    }

    let mut configs = Vec::new();
    for config in class_configs.into_iter().chain(claim_configs) {
        let opaque = config.opaque.as_ref().ok_or_else(|| {
            DeviceStateError::UnsupportedConfigKind(
                "only opaque parameters are supported by this driver".to_string(),
            )
        })?;
        if opaque.driver != driver_name {
            log::debug!("Skipping config of driver {}", opaque.driver);
            continue;
        }
        let decoded = decoder.decode(&opaque.parameters).map_err(|error| {
            DeviceStateError::UnsupportedConfigKind(format!(
                "error decoding config parameters: {error:#}"
            ))
        })?;
        configs.push(OpaqueDeviceConfig {
            requests: config.requests.clone(),
            config: decoded,
        });
    }
    Ok(ResolvedConfigs::new(configs))
}
