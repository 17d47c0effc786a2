use crate::config::{CoverageConfig, ModuleConfig, TomlConfig};
use crate::core::engine::RunMode;
use crate::core::writer::XML_REPORT;
use crate::utils::error::{CoverageError, Result};
use crate::utils::validation::{validate_path, Validate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "coverage-rollup.toml";

#[derive(Debug, Parser)]
#[command(name = "coverage-rollup")]
#[command(version, about = "Aggregates per-module coverage data into one report and checks it against thresholds")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Module to include, as NAME or NAME=PATH; replaces the configured modules
    #[arg(long = "module", global = true, value_name = "NAME[=PATH]")]
    pub modules: Vec<ModuleConfig>,

    /// Report output directory
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Bundle name used in reports and rule messages
    #[arg(long, global = true)]
    pub name: Option<String>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Write the aggregated report in all formats and print the summary
    Report,
    /// Check the thresholds without writing reports
    Verify,
    /// Report, then verify
    Check,
    /// Print the summary of an existing XML report
    Summary {
        /// Defaults to the report in the configured output directory
        xml: Option<PathBuf>,
    },
    /// Show the resolved configuration and discovered inputs
    Plan,
}

impl Command {
    /// Engine mode of the commands that aggregate; `None` for the others.
    pub fn run_mode(&self) -> Option<RunMode> {
        match self {
            Command::Report => Some(RunMode::Report),
            Command::Verify => Some(RunMode::Verify),
            Command::Check => Some(RunMode::Check),
            Command::Summary { .. } | Command::Plan => None,
        }
    }
}

impl Cli {
    fn load_toml(&self) -> Result<(TomlConfig, PathBuf)> {
        let cwd = std::env::current_dir()?;
        let (mut config, base_dir) = match &self.config {
            Some(path) => {
                let base = path.parent().map(|p| cwd.join(p)).unwrap_or_else(|| cwd.clone());
                (TomlConfig::from_file(path)?, base)
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                (TomlConfig::from_file(DEFAULT_CONFIG_FILE)?, cwd.clone())
            }
            None => (TomlConfig::default(), cwd.clone()),
        };

        if !self.modules.is_empty() {
            config.modules = self.modules.clone();
        }
        if let Some(name) = &self.name {
            config.project.name = name.clone();
        }
        Ok((config, base_dir))
    }

    /// Merged file and flag configuration, validated and resolved.
    pub fn resolve_config(&self) -> Result<CoverageConfig> {
        let (config, base_dir) = self.load_toml()?;
        config.validate()?;

        let mut resolved = config.resolve(&base_dir);
        if let Some(dir) = &self.output_dir {
            validate_path("--output-dir", &dir.to_string_lossy())?;
            resolved.output_dir = std::env::current_dir()?.join(dir);
        }
        Ok(resolved)
    }

    /// XML report the `summary` command reads.
    pub fn summary_path(&self) -> Result<PathBuf> {
        if let Command::Summary { xml: Some(path) } = &self.command {
            return Ok(path.clone());
        }
        if let Some(dir) = &self.output_dir {
            return Ok(dir.join(XML_REPORT));
        }
        let (config, base_dir) = self.load_toml()?;
        let resolved = config.resolve(&base_dir);
        Ok(resolved.output_dir.join(XML_REPORT))
    }
}

impl Validate for Cli {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoverageError::InvalidConfigValueError {
                    field: "--name".to_string(),
                    value: name.clone(),
                    reason: "Bundle name cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
