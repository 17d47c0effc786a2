//! Loading of raw execution data.
//!
//! Every module writes its execution data below `<module>/<exec dir>` as
//! `.exec` files. A file is a JSON document listing, per compiled unit, the
//! hit flag of every probe. Files of one module are merged into a single
//! [`TraceSet`] by probe-wise union.

use crate::domain::model::{Module, SessionInfo, TraceKey, TraceSet};
use crate::utils::error::{CoverageError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const EXEC_EXTENSION: &str = "exec";
pub const EXEC_FORMAT: &str = "covtrace";
pub const EXEC_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRecord {
    pub name: String,
    pub probes: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecFile {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub sessions: Vec<SessionInfo>,
    #[serde(default)]
    pub units: Vec<ExecRecord>,
}

impl ExecFile {
    pub fn new(sessions: Vec<SessionInfo>, units: Vec<ExecRecord>) -> Self {
        Self {
            format: EXEC_FORMAT.to_string(),
            version: EXEC_VERSION,
            sessions,
            units,
        }
    }
}

/// All `.exec` files below `dir`, sorted. A missing directory yields none;
/// a directory that cannot be walked is an error, not an empty result.
pub fn find_exec_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().is_some_and(|ext| ext == EXEC_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses one raw file and attributes its records to `module`.
pub fn parse_exec(path: &Path, data: &[u8], module: &str) -> Result<TraceSet> {
    let corrupt = |reason: String| CoverageError::DataCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let file: ExecFile = serde_json::from_slice(data).map_err(|e| corrupt(e.to_string()))?;

    if file.format != EXEC_FORMAT {
        return Err(corrupt(format!(
            "unexpected format '{}', expected '{}'",
            file.format, EXEC_FORMAT
        )));
    }
    if file.version != EXEC_VERSION {
        return Err(corrupt(format!(
            "unsupported version {}, expected {}",
            file.version, EXEC_VERSION
        )));
    }

    let mut traces = TraceSet::new();
    for session in file.sessions {
        traces.add_session(session);
    }
    for record in file.units {
        let name = record.name.trim().replace('\\', "/");
        if name.is_empty() {
            return Err(corrupt("record without a unit name".to_string()));
        }
        traces
            .insert(TraceKey::new(module, name), record.probes)
            .map_err(|m| {
                corrupt(format!(
                    "incompatible records for {}: {} probes vs {}",
                    m.key.unit, m.expected, m.found
                ))
            })?;
    }

    Ok(traces)
}

/// Reads and merges every raw file of one module.
pub fn load_module_traces(module: &Module) -> Result<(TraceSet, Vec<PathBuf>)> {
    let files = find_exec_files(&module.exec_dir)?;
    if files.is_empty() {
        tracing::debug!(
            "No execution data for module {} under {}",
            module.name,
            module.exec_dir.display()
        );
    }

    let mut merged = TraceSet::new();
    for path in &files {
        let data = std::fs::read(path)?;
        let traces = parse_exec(path, &data, &module.name)?;
        tracing::debug!(
            "Loaded {} unit records from {}",
            traces.len(),
            path.display()
        );
        merged.merge(traces).map_err(|m| CoverageError::DataCorrupt {
            path: path.clone(),
            reason: format!(
                "incompatible execution data for {}: {} probes recorded earlier, {} here",
                m.key.unit, m.expected, m.found
            ),
        })?;
    }

    Ok((merged, files))
}

/// Union of the per-module trace sets.
pub fn merge_traces(sets: impl IntoIterator<Item = TraceSet>) -> Result<TraceSet> {
    let mut merged = TraceSet::new();
    for set in sets {
        merged.merge(set).map_err(|m| CoverageError::ProcessingError {
            message: format!(
                "unit {} of module {} traced with {} and {} probes",
                m.key.unit, m.key.module, m.expected, m.found
            ),
        })?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn exec_json(units: &[(&str, Vec<bool>)]) -> Vec<u8> {
        let file = ExecFile::new(
            vec![],
            units
                .iter()
                .map(|(name, probes)| ExecRecord {
                    name: name.to_string(),
                    probes: probes.clone(),
                })
                .collect(),
        );
        serde_json::to_vec(&file).unwrap()
    }

    fn module_at(dir: &Path) -> Module {
        Module {
            name: "orders".to_string(),
            root: dir.to_path_buf(),
            source_roots: vec![],
            class_roots: vec![dir.join("build/classes/java/main")],
            exec_dir: dir.join("build/jacoco"),
        }
    }

    #[test]
    fn test_parse_valid_file() {
        let data = exec_json(&[("com/acme/Foo", vec![true, false])]);
        let traces = parse_exec(Path::new("a.exec"), &data, "orders").unwrap();
        assert_eq!(traces.get("orders", "com/acme/Foo"), Some(&[true, false][..]));
    }

    #[test]
    fn test_parse_garbage_is_corrupt() {
        let err = parse_exec(Path::new("a.exec"), b"\xC0\xC0\x10\x07", "orders").unwrap_err();
        assert!(matches!(err, CoverageError::DataCorrupt { .. }));
    }

    #[test]
    fn test_parse_wrong_version_is_corrupt() {
        let data = br#"{"format":"covtrace","version":9,"units":[]}"#;
        let err = parse_exec(Path::new("a.exec"), data, "orders").unwrap_err();
        assert!(err.to_string().contains("unsupported version 9"));
    }

    #[test]
    fn test_sessions_are_kept() {
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let file = ExecFile::new(
            vec![SessionInfo {
                id: "ci-1".to_string(),
                start,
                dump: start,
            }],
            vec![],
        );
        let data = serde_json::to_vec(&file).unwrap();
        let traces = parse_exec(Path::new("a.exec"), &data, "orders").unwrap();
        assert_eq!(traces.sessions().count(), 1);
        assert!(traces.is_empty());
    }

    #[test]
    fn test_missing_exec_dir_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let (traces, files) = load_module_traces(&module_at(dir.path())).unwrap();
        assert!(traces.is_empty());
        assert!(files.is_empty());
    }

    #[test]
    fn test_repeated_runs_are_unioned() {
        let dir = TempDir::new().unwrap();
        let exec_dir = dir.path().join("build/jacoco");
        std::fs::create_dir_all(exec_dir.join("nested")).unwrap();
        std::fs::write(
            exec_dir.join("test.exec"),
            exec_json(&[("com/acme/Foo", vec![true, false, false])]),
        )
        .unwrap();
        std::fs::write(
            exec_dir.join("nested/integrationTest.exec"),
            exec_json(&[("com/acme/Foo", vec![true, false, true])]),
        )
        .unwrap();
        std::fs::write(exec_dir.join("notes.txt"), b"not execution data").unwrap();

        let (traces, files) = load_module_traces(&module_at(dir.path())).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(
            traces.get("orders", "com/acme/Foo"),
            Some(&[true, false, true][..])
        );
    }

    #[test]
    fn test_corrupt_file_aborts_module() {
        let dir = TempDir::new().unwrap();
        let exec_dir = dir.path().join("build/jacoco");
        std::fs::create_dir_all(&exec_dir).unwrap();
        std::fs::write(exec_dir.join("a.exec"), exec_json(&[("Foo", vec![true])])).unwrap();
        std::fs::write(exec_dir.join("b.exec"), b"{ truncated").unwrap();

        let err = load_module_traces(&module_at(dir.path())).unwrap_err();
        match err {
            CoverageError::DataCorrupt { path, .. } => assert!(path.ends_with("b.exec")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_incompatible_runs_are_corrupt() {
        let dir = TempDir::new().unwrap();
        let exec_dir = dir.path().join("build/jacoco");
        std::fs::create_dir_all(&exec_dir).unwrap();
        std::fs::write(exec_dir.join("a.exec"), exec_json(&[("Foo", vec![true, true])])).unwrap();
        std::fs::write(exec_dir.join("b.exec"), exec_json(&[("Foo", vec![true])])).unwrap();

        let err = load_module_traces(&module_at(dir.path())).unwrap_err();
        assert!(err.to_string().contains("incompatible execution data"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unwalkable_exec_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exec_dir = dir.path().join("build/jacoco");
        std::fs::create_dir_all(&exec_dir).unwrap();
        std::fs::write(exec_dir.join("test.exec"), exec_json(&[("Foo", vec![true])])).unwrap();
        std::os::unix::fs::symlink(&exec_dir, exec_dir.join("again")).unwrap();

        let err = find_exec_files(&exec_dir).unwrap_err();
        assert!(matches!(err, CoverageError::IoError(_)));
    }
}
