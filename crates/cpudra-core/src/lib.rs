pub mod apply;
pub mod catalog;
pub mod checkpoint;
pub mod claim;
pub mod common;
pub mod config;
pub mod edits;
pub mod prepared;
pub mod state;

#[cfg(test)]
pub(crate) mod tests;

pub use crate::common::{Map, Set};
pub use crate::state::DeviceState;

pub type Error = crate::common::error::DeviceStateError;
pub type Result<T> = std::result::Result<T, Error>;

/// Name under which the plugin registers with the kubelet and which opaque
/// configurations have to declare to be considered by this driver.
pub const DRIVER_NAME: &str = "manager.cpu.com";
