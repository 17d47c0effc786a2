pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::LocalStorage;
pub use config::{CoverageConfig, TomlConfig};
pub use core::engine::{CoverageEngine, RunMode, RunOutcome};
pub use core::pipeline::CoveragePipeline;
pub use utils::error::{CoverageError, Result};

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Command};
