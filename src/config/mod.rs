//! # Configuration
//!
//! Command-line flags and environment-driven settings.

pub mod cli;
pub mod controller;

pub use cli::Args;
pub use controller::{ControllerConfig, LogFormat};
