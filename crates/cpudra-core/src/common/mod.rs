pub(crate) mod data_structures;
pub mod error;
pub mod fsutils;

pub use data_structures::{Map, Set};
