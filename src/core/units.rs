//! Discovery of compiled units below a module's class roots.

use crate::domain::model::{CompiledUnit, Module, ProbeMap};
use crate::utils::error::{CoverageError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const UNIT_EXTENSION: &str = "class";

/// `/`-separated path of `file` relative to `root`.
fn relative_name(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

pub fn parse_probe_map(path: &Path, data: &[u8]) -> Result<ProbeMap> {
    serde_json::from_slice(data).map_err(|e| CoverageError::DataCorrupt {
        path: path.to_path_buf(),
        reason: format!("invalid probe map: {}", e),
    })
}

fn resolve_source(module: &Module, package: &str, source_file: Option<&str>) -> Option<PathBuf> {
    let source_file = source_file?;
    module
        .source_roots
        .iter()
        .map(|root| {
            if package.is_empty() {
                root.join(source_file)
            } else {
                root.join(package).join(source_file)
            }
        })
        .find(|candidate| candidate.is_file())
}

/// Walks every class root of `module`. Units come back sorted by id.
pub fn discover_units(module: &Module) -> Result<Vec<CompiledUnit>> {
    let mut units = Vec::new();

    for root in &module.class_roots {
        if !root.is_dir() {
            tracing::debug!(
                "Class root {} of module {} does not exist",
                root.display(),
                module.name
            );
            continue;
        }

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = entry.into_path();
            if !file.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
                continue;
            }
            let Some(relative_path) = relative_name(root, &file) else {
                continue;
            };

            let probes = parse_probe_map(&file, &std::fs::read(&file)?)?;
            let id = relative_path
                .strip_suffix(&format!(".{}", UNIT_EXTENSION))
                .unwrap_or(&relative_path)
                .to_string();

            let mut unit = CompiledUnit {
                module: module.name.clone(),
                id,
                relative_path,
                file,
                source_path: None,
                probes,
            };
            unit.source_path =
                resolve_source(module, unit.package(), unit.probes.source_file.as_deref());
            units.push(unit);
        }
    }

    units.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.file.cmp(&b.file)));
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROBE_MAP: &str = r#"{
        "source_file": "OrderService.java",
        "methods": [
            {"name": "place", "line": 10, "probes": [{"line": 11}, {"line": 12, "branch": true}]}
        ]
    }"#;

    fn module_at(dir: &Path) -> Module {
        Module {
            name: "orders".to_string(),
            root: dir.to_path_buf(),
            source_roots: vec![dir.join("src/main/java")],
            class_roots: vec![dir.join("build/classes/java/main")],
            exec_dir: dir.join("build/jacoco"),
        }
    }

    #[test]
    fn test_discovers_units_and_sources() {
        let dir = TempDir::new().unwrap();
        let module = module_at(dir.path());
        let pkg = module.class_roots[0].join("com/acme/order");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("OrderService.class"), PROBE_MAP).unwrap();
        std::fs::write(pkg.join("README.md"), "ignored").unwrap();

        let src = module.source_roots[0].join("com/acme/order");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("OrderService.java"), "class OrderService {}").unwrap();

        let units = discover_units(&module).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.id, "com/acme/order/OrderService");
        assert_eq!(unit.relative_path, "com/acme/order/OrderService.class");
        assert_eq!(unit.package(), "com/acme/order");
        assert_eq!(unit.probes.probe_count(), 2);
        assert_eq!(
            unit.source_path.as_deref(),
            Some(src.join("OrderService.java").as_path())
        );
    }

    #[test]
    fn test_missing_class_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(discover_units(&module_at(dir.path())).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_probe_map_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let module = module_at(dir.path());
        std::fs::create_dir_all(&module.class_roots[0]).unwrap();
        std::fs::write(module.class_roots[0].join("Broken.class"), [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        let err = discover_units(&module).unwrap_err();
        assert!(matches!(err, CoverageError::DataCorrupt { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unwalkable_class_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let module = module_at(dir.path());
        let pkg = module.class_roots[0].join("com/acme");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("OrderService.class"), PROBE_MAP).unwrap();
        std::os::unix::fs::symlink(&module.class_roots[0], pkg.join("loop")).unwrap();

        let err = discover_units(&module).unwrap_err();
        assert!(matches!(err, CoverageError::IoError(_)));
    }
}
