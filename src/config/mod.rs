//! Configuration module for Site-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every value has a default, so an empty file (or no file) is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use site_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring into: {}", config.output.save_dir);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, MirrorConfig, OutputConfig, ScopeConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
