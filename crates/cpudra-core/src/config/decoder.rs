use anyhow::{anyhow, bail};

use crate::config::{CpuConfig, DeviceConfig};

pub const CONFIG_API_VERSION: &str = "manager.cpu.com/v1alpha1";
pub const CPU_CONFIG_KIND: &str = "CpuConfig";

/// Turns the raw parameters of an opaque configuration into a typed config.
pub trait ConfigDecoder: Send + Sync {
    fn decode(&self, parameters: &serde_json::Value) -> anyhow::Result<DeviceConfig>;
}

/// Decodes Kubernetes-style objects identified by `apiVersion` and `kind`.
#[derive(Default)]
pub struct JsonConfigDecoder;

impl ConfigDecoder for JsonConfigDecoder {
    fn decode(&self, parameters: &serde_json::Value) -> anyhow::Result<DeviceConfig> {
        let mut object = parameters
            .as_object()
            .cloned()
            .ok_or_else(|| anyhow!("parameters have to be an object"))?;

        let api_version = object.remove("apiVersion");
        let kind = object.remove("kind");
        match api_version.as_ref().and_then(|v| v.as_str()) {
            Some(CONFIG_API_VERSION) => {}
            Some(other) => bail!("unknown apiVersion {other:?}"),
            None => bail!("missing apiVersion"),
        }
        match kind.as_ref().and_then(|v| v.as_str()) {
            Some(CPU_CONFIG_KIND) => {
                let config: CpuConfig = serde_json::from_value(object.into())?;
                Ok(DeviceConfig::Cpu(config))
            }
            Some(other) => bail!("unknown kind {other:?}"),
            None => bail!("missing kind"),
        }
    }
}
