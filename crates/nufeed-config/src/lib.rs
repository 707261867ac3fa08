//! Configuration for nufeed.
//!
//! Loads the TOML configuration document and turns `[[source]]` entries into
//! running source stacks through a compile-time factory.

pub mod config;
pub mod error;
pub mod factory;

pub use config::{Config, SourceEntry, SourceKind};
pub use error::{ConfigError, Result};
pub use factory::{build_source, BuiltSource};
