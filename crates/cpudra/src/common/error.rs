use thiserror::Error;

use crate::common::error::CpudraError::GenericError;

#[derive(Debug, Error)]
pub enum CpudraError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Device state error: {0}")]
    DeviceStateError(#[from] cpudra_core::Error),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<anyhow::Error> for CpudraError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(format!("{error:#}"))
    }
}

pub fn error<T>(message: String) -> crate::Result<T> {
    Err(GenericError(message))
}
