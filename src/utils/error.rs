use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Corrupt coverage data in {path}: {reason}")]
    DataCorrupt { path: PathBuf, reason: String },

    #[error("Compiled unit {unit} must belong to exactly one module, found: [{}]", owners.join(", "))]
    AmbiguousUnit { unit: String, owners: Vec<String> },

    #[error("Cannot write report file {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot extract a coverage summary from {path}: {reason}")]
    SummaryParse { path: PathBuf, reason: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    Configuration,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CoverageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoverageError::DataCorrupt { .. }
            | CoverageError::SerializationError(_)
            | CoverageError::ProcessingError { .. } => ErrorCategory::Data,
            CoverageError::AmbiguousUnit { .. }
            | CoverageError::ConfigError { .. }
            | CoverageError::ConfigValidationError { .. }
            | CoverageError::InvalidConfigValueError { .. }
            | CoverageError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CoverageError::ReportWrite { .. }
            | CoverageError::SummaryParse { .. }
            | CoverageError::CsvError(_) => ErrorCategory::Output,
            CoverageError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoverageError::SummaryParse { .. } => ErrorSeverity::Low,
            CoverageError::ProcessingError { .. } => ErrorSeverity::Medium,
            CoverageError::AmbiguousUnit { .. }
            | CoverageError::ConfigError { .. }
            | CoverageError::ConfigValidationError { .. }
            | CoverageError::InvalidConfigValueError { .. }
            | CoverageError::MissingConfigError { .. }
            | CoverageError::ReportWrite { .. }
            | CoverageError::CsvError(_) => ErrorSeverity::High,
            CoverageError::DataCorrupt { .. }
            | CoverageError::SerializationError(_)
            | CoverageError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the run can continue after this error was reported.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CoverageError::SummaryParse { .. })
    }

    /// Process exit status for this error. Non-fatal errors exit 0.
    pub fn exit_code(&self) -> i32 {
        if !self.is_fatal() {
            return 0;
        }
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CoverageError::DataCorrupt { .. } => {
                "Delete the damaged execution data and re-run the module's tests"
            }
            CoverageError::AmbiguousUnit { .. } => {
                "Make sure class roots of different modules do not overlap"
            }
            CoverageError::ReportWrite { .. } => {
                "Check that the output directory exists and is writable"
            }
            CoverageError::SummaryParse { .. } => {
                "Regenerate the XML report; the summary is informational only"
            }
            CoverageError::CsvError(_) => "Check free disk space and output permissions",
            CoverageError::IoError(_) => "Check file permissions and that the paths exist",
            CoverageError::SerializationError(_) => {
                "Regenerate the input files with a compatible tool version"
            }
            CoverageError::ConfigError { .. }
            | CoverageError::ConfigValidationError { .. }
            | CoverageError::InvalidConfigValueError { .. }
            | CoverageError::MissingConfigError { .. } => {
                "Fix the configuration file or command line flags and retry"
            }
            CoverageError::ProcessingError { .. } => "Retry the run; report the issue if it persists",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CoverageError::DataCorrupt { path, .. } => {
                format!("Execution data at {} could not be read", path.display())
            }
            CoverageError::AmbiguousUnit { unit, owners } if owners.is_empty() => {
                format!("Compiled unit {} does not belong to any module", unit)
            }
            CoverageError::AmbiguousUnit { unit, owners } => format!(
                "Compiled unit {} is claimed by several modules: {}",
                unit,
                owners.join(", ")
            ),
            CoverageError::ReportWrite { path, .. } => {
                format!("Could not write report to {}", path.display())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;
