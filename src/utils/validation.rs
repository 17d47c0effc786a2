use crate::utils::error::{CoverageError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CoverageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CoverageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(CoverageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// Exclusion and inclusion patterns are matched against `/`-separated
/// relative paths, so absolute or backslash patterns can never match.
pub fn validate_glob_patterns(field_name: &str, patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        validate_non_empty_string(field_name, pattern)?;
        if pattern.starts_with('/') || pattern.contains('\\') {
            return Err(CoverageError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: pattern.clone(),
                reason: "Patterns are relative and use '/' as separator".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_unique_names<'a>(field_name: &str, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CoverageError::ConfigValidationError {
                field: field_name.to_string(),
                message: format!("'{}' is listed more than once", name),
            });
        }
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoverageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // written so that NaN is out of range
    let in_range = value >= min && value <= max;
    if !in_range {
        return Err(CoverageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
