#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::{ModuleConfig, TomlConfig};

use crate::domain::model::{Module, ThresholdRule};
use crate::domain::ports::ConfigProvider;
use std::path::{Path, PathBuf};

/// Fully resolved run configuration: absolute paths, rule sets filled in.
#[derive(Debug, Clone)]
pub struct CoverageConfig {
    pub bundle_name: String,
    pub modules: Vec<Module>,
    pub output_dir: PathBuf,
    pub report_includes: Vec<String>,
    pub report_excludes: Vec<String>,
    pub verification_includes: Vec<String>,
    pub verification_excludes: Vec<String>,
    pub rules: Vec<ThresholdRule>,
    pub verify_per_module: bool,
    pub concurrent_modules: usize,
}

impl ConfigProvider for CoverageConfig {
    fn bundle_name(&self) -> &str {
        &self.bundle_name
    }

    fn modules(&self) -> &[Module] {
        &self.modules
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn report_includes(&self) -> &[String] {
        &self.report_includes
    }

    fn report_excludes(&self) -> &[String] {
        &self.report_excludes
    }

    fn verification_includes(&self) -> &[String] {
        &self.verification_includes
    }

    fn verification_excludes(&self) -> &[String] {
        &self.verification_excludes
    }

    fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    fn verify_per_module(&self) -> bool {
        self.verify_per_module
    }

    fn concurrent_modules(&self) -> usize {
        self.concurrent_modules
    }
}
