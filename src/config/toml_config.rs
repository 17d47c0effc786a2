use crate::config::CoverageConfig;
use crate::core::filter::default_excludes;
use crate::domain::model::{Module, ThresholdRule};
use crate::utils::error::{CoverageError, Result};
use crate::utils::validation::{
    validate_glob_patterns, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_unique_names, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_OUTPUT_DIR: &str = "build/reports/coverage";
pub const DEFAULT_SOURCE_ROOT: &str = "src/main/java";
pub const DEFAULT_CLASS_ROOT: &str = "build/classes/java/main";
pub const DEFAULT_EXEC_DIR: &str = "build/jacoco";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub project: ProjectConfig,
    pub defaults: LayoutConfig,
    pub modules: Vec<ModuleConfig>,
    pub report: FilterConfig,
    pub verification: VerificationConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    /// Directory module paths are relative to; relative to the config file.
    pub root: String,
    pub output_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "coverage".to_string(),
            root: ".".to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

/// Module layout, relative to each module's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub source_roots: Vec<String>,
    pub class_roots: Vec<String>,
    pub exec_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_roots: vec![DEFAULT_SOURCE_ROOT.to_string()],
            class_roots: vec![DEFAULT_CLASS_ROOT.to_string()],
            exec_dir: DEFAULT_EXEC_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    /// Defaults to the module name.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source_roots: Option<Vec<String>>,
    #[serde(default)]
    pub class_roots: Option<Vec<String>>,
    #[serde(default)]
    pub exec_dir: Option<String>,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            source_roots: None,
            class_roots: None,
            exec_dir: None,
        }
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    fn resolve(&self, root: &Path, layout: &LayoutConfig) -> Module {
        let module_root = root.join(self.path());
        let join_all = |dirs: &[String]| dirs.iter().map(|d| module_root.join(d)).collect::<Vec<_>>();

        Module {
            name: self.name.clone(),
            source_roots: join_all(self.source_roots.as_deref().unwrap_or(&layout.source_roots)),
            class_roots: join_all(self.class_roots.as_deref().unwrap_or(&layout.class_roots)),
            exec_dir: module_root.join(self.exec_dir.as_deref().unwrap_or(&layout.exec_dir)),
            root: module_root,
        }
    }
}

/// `name` or `name=path`, as given on the command line.
impl FromStr for ModuleConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, path) = match s.split_once('=') {
            Some((name, path)) => (name.trim(), Some(path.trim())),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(format!("module '{}' has no name", s));
        }
        let mut module = ModuleConfig::new(name);
        module.path = path.filter(|p| !p.is_empty()).map(str::to_string);
        Ok(module)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: default_excludes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Falls back to `report.includes` when absent.
    pub includes: Option<Vec<String>>,
    /// Falls back to `report.excludes` when absent.
    pub excludes: Option<Vec<String>>,
    pub rules: Vec<ThresholdRule>,
    /// Apply `rules` to each module as well as to the bundle.
    pub per_module: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            includes: None,
            excludes: None,
            rules: ThresholdRule::defaults(),
            per_module: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub concurrent_modules: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrent_modules: 4,
        }
    }
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| CoverageError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CoverageError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// Resolves every path against `base_dir` joined with `project.root`.
    pub fn resolve(&self, base_dir: &Path) -> CoverageConfig {
        let root = base_dir.join(&self.project.root);
        let modules = self
            .modules
            .iter()
            .map(|m| m.resolve(&root, &self.defaults))
            .collect();

        CoverageConfig {
            bundle_name: self.project.name.clone(),
            output_dir: absolute(&root, &self.project.output_dir),
            modules,
            report_includes: self.report.includes.clone(),
            report_excludes: self.report.excludes.clone(),
            verification_includes: self
                .verification
                .includes
                .clone()
                .unwrap_or_else(|| self.report.includes.clone()),
            verification_excludes: self
                .verification
                .excludes
                .clone()
                .unwrap_or_else(|| self.report.excludes.clone()),
            rules: self.verification.rules.clone(),
            verify_per_module: self.verification.per_module,
            concurrent_modules: self.execution.concurrent_modules,
        }
    }
}

fn absolute(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("project.name", &self.project.name)?;
        validate_path("project.root", &self.project.root)?;
        validate_path("project.output_dir", &self.project.output_dir)?;
        validate_path("defaults.exec_dir", &self.defaults.exec_dir)?;

        if self.modules.is_empty() {
            return Err(CoverageError::MissingConfigError {
                field: "modules".to_string(),
            });
        }
        validate_unique_names("modules", self.modules.iter().map(|m| m.name.as_str()))?;
        for module in &self.modules {
            validate_non_empty_string("modules.name", &module.name)?;
            validate_path("modules.path", module.path())?;
            let class_roots = module.class_roots.as_ref().unwrap_or(&self.defaults.class_roots);
            if class_roots.is_empty() {
                return Err(CoverageError::ConfigValidationError {
                    field: format!("modules.{}.class_roots", module.name),
                    message: "at least one class root is required".to_string(),
                });
            }
        }

        validate_glob_patterns("report.includes", &self.report.includes)?;
        validate_glob_patterns("report.excludes", &self.report.excludes)?;
        if let Some(includes) = &self.verification.includes {
            validate_glob_patterns("verification.includes", includes)?;
        }
        if let Some(excludes) = &self.verification.excludes {
            validate_glob_patterns("verification.excludes", excludes)?;
        }
        for rule in &self.verification.rules {
            validate_range(
                &format!("verification.rules.{}.minimum", rule.counter),
                rule.minimum,
                0.0,
                1.0,
            )?;
        }

        validate_positive_number("execution.concurrent_modules", self.execution.concurrent_modules, 1)
    }
}
