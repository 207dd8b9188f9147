//! Shared domain types for the Vigil monitoring pipeline.

pub mod analysis;
pub mod config;
pub mod frame;
pub mod summary;
pub mod telemetry;

mod errors;

pub use errors::{Result, VigilError};
