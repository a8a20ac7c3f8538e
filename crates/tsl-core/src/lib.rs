//! tsl-core: Core types and configuration for the touchscreen instrument launcher
//!
//! This crate provides the port and process types, the error taxonomy,
//! TOML configuration and the audio graph trait shared by the orchestrator
//! and the CLI.

pub mod config;
pub mod error;
pub mod pidfile;
pub mod traits;
pub mod types;

pub use error::{ConfigError, GraphError, PortConnectionError, StartupError};
pub use traits::AudioGraph;
pub use types::{ConnectionSpec, PortDirection, PortEndpoint, ProcessRole, ProcessState};
