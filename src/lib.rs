//! DomainHost library
//!
//! Wires the session store and the interception pipeline into one host and
//! exposes the pieces the binary and integration tests use.

pub mod cli;
pub mod config;
pub mod demo;
pub mod host;
pub mod runtime;

pub use config::{load_config, ConfigError, HostConfig, LoadOptions, LoadedConfig};
pub use host::{DomainHost, DomainHostBuilder};
pub use runtime::init_logging;
