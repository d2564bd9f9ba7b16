pub mod cdi;
pub mod common;
pub mod config;
pub mod discovery;
pub mod driver;

pub type Error = crate::common::error::CpudraError;
pub type Result<T> = std::result::Result<T, Error>;

pub use cpudra_core::DRIVER_NAME;

pub const CPUDRA_VERSION: &str = env!("CARGO_PKG_VERSION");
