pub mod cli;
pub mod cpuset;
pub mod error;
pub mod parser;
pub mod setup;
