use crate::core::glob::GlobPattern;
use crate::domain::model::{CompiledUnit, Module};
use crate::utils::error::{CoverageError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Patterns excluded from both reporting and verification unless configured
/// otherwise: configuration, persistence entities, DTOs, exceptions,
/// application entry points and generated query classes.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/config/**",
    "**/entity/**",
    "**/dto/**",
    "**/exception/**",
    "**/*Application*",
    "**/Q*.class",
];

pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

/// Include/exclude rule set applied to compiled-unit names.
#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    includes: Vec<GlobPattern>,
    excludes: Vec<GlobPattern>,
}

impl UnitFilter {
    pub fn new<I, E>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            includes: includes
                .into_iter()
                .map(|p| GlobPattern::new(p.as_ref()))
                .collect(),
            excludes: excludes
                .into_iter()
                .map(|p| GlobPattern::new(p.as_ref()))
                .collect(),
        }
    }

    pub fn excluding<E>(excludes: E) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::new(Vec::<String>::new(), excludes)
    }

    pub fn retains(&self, name: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|p| p.matches(name));
        included && !self.excludes.iter().any(|p| p.matches(name))
    }

    pub fn apply<'a>(&self, units: impl IntoIterator<Item = &'a CompiledUnit>) -> Vec<&'a CompiledUnit> {
        units
            .into_iter()
            .filter(|unit| {
                let keep = self.retains(&unit.relative_path);
                if !keep {
                    tracing::trace!("Excluding {}:{}", unit.module, unit.relative_path);
                }
                keep
            })
            .collect()
    }
}

/// The single module whose class roots contain `path`.
pub fn resolve_owner<'a>(path: &Path, modules: &'a [Module]) -> Result<&'a Module> {
    let owners: Vec<&Module> = modules
        .iter()
        .filter(|m| m.class_roots.iter().any(|root| path.starts_with(root)))
        .collect();

    match owners.as_slice() {
        [owner] => Ok(*owner),
        _ => Err(CoverageError::AmbiguousUnit {
            unit: path.display().to_string(),
            owners: owners.iter().map(|m| m.name.clone()).collect(),
        }),
    }
}

/// Checks that every discovered unit is owned by the module that found it
/// and by no other, and that no module holds two units with the same id.
pub fn check_ownership<'a>(
    units: impl IntoIterator<Item = &'a CompiledUnit>,
    modules: &[Module],
) -> Result<()> {
    let mut seen: BTreeMap<(&str, &str), &Path> = BTreeMap::new();

    for unit in units {
        let owner = resolve_owner(&unit.file, modules)?;
        if owner.name != unit.module {
            return Err(CoverageError::AmbiguousUnit {
                unit: unit.file.display().to_string(),
                owners: vec![unit.module.clone(), owner.name.clone()],
            });
        }
        let key = (unit.module.as_str(), unit.id.as_str());
        if let Some(previous) = seen.insert(key, unit.file.as_path()) {
            if previous != unit.file.as_path() {
                return Err(CoverageError::AmbiguousUnit {
                    unit: format!("{} ({} and {})", unit.id, previous.display(), unit.file.display()),
                    owners: vec![unit.module.clone()],
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ProbeMap;
    use std::path::PathBuf;

    fn module(name: &str, class_root: &str) -> Module {
        Module {
            name: name.to_string(),
            root: PathBuf::from(format!("/ws/{}", name)),
            source_roots: vec![],
            class_roots: vec![PathBuf::from(class_root)],
            exec_dir: PathBuf::from(format!("/ws/{}/build/jacoco", name)),
        }
    }

    fn unit(module: &str, root: &str, relative: &str) -> CompiledUnit {
        CompiledUnit {
            module: module.to_string(),
            id: relative.trim_end_matches(".class").to_string(),
            relative_path: relative.to_string(),
            file: PathBuf::from(root).join(relative),
            source_path: None,
            probes: ProbeMap::default(),
        }
    }

    #[test]
    fn test_default_excludes() {
        let filter = UnitFilter::excluding(DEFAULT_EXCLUDES);
        assert!(filter.retains("com/acme/order/OrderService.class"));
        assert!(!filter.retains("com/acme/config/RedisConfig.class"));
        assert!(!filter.retains("com/acme/order/entity/Order.class"));
        assert!(!filter.retains("com/acme/order/dto/OrderDto.class"));
        assert!(!filter.retains("com/acme/exception/NotFound.class"));
        assert!(!filter.retains("com/acme/ShopApplication.class"));
        assert!(!filter.retains("com/acme/order/QOrder.class"));
    }

    #[test]
    fn test_includes_narrow_the_set() {
        let filter = UnitFilter::new(["com/acme/order/**"], ["**/*Test*"]);
        assert!(filter.retains("com/acme/order/OrderService.class"));
        assert!(!filter.retains("com/acme/user/UserService.class"));
        assert!(!filter.retains("com/acme/order/OrderTestSupport.class"));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = UnitFilter::default();
        assert!(filter.retains("com/acme/config/RedisConfig.class"));
    }

    #[test]
    fn test_apply_filters_units() {
        let units = vec![
            unit("a", "/ws/a/classes", "com/acme/Service.class"),
            unit("a", "/ws/a/classes", "com/acme/dto/Request.class"),
        ];
        let filter = UnitFilter::excluding(["**/dto/**"]);
        let kept = filter.apply(&units);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "com/acme/Service");
    }

    #[test]
    fn test_resolve_owner_unique() {
        let modules = vec![module("a", "/ws/a/classes"), module("b", "/ws/b/classes")];
        let owner = resolve_owner(Path::new("/ws/b/classes/com/X.class"), &modules).unwrap();
        assert_eq!(owner.name, "b");
    }

    #[test]
    fn test_resolve_owner_none_is_ambiguous() {
        let modules = vec![module("a", "/ws/a/classes")];
        let err = resolve_owner(Path::new("/elsewhere/X.class"), &modules).unwrap_err();
        assert!(matches!(err, CoverageError::AmbiguousUnit { ref owners, .. } if owners.is_empty()));
    }

    #[test]
    fn test_overlapping_roots_are_ambiguous() {
        let modules = vec![module("a", "/ws/classes"), module("b", "/ws/classes/b")];
        let units = vec![unit("b", "/ws/classes/b", "com/X.class")];
        let err = check_ownership(&units, &modules).unwrap_err();
        match err {
            CoverageError::AmbiguousUnit { owners, .. } => assert_eq!(owners, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_within_module_are_ambiguous() {
        let mut modules = vec![module("a", "/ws/a/main")];
        modules[0].class_roots.push(PathBuf::from("/ws/a/extra"));
        let units = vec![
            unit("a", "/ws/a/main", "com/X.class"),
            unit("a", "/ws/a/extra", "com/X.class"),
        ];
        assert!(check_ownership(&units, &modules).is_err());
    }

    #[test]
    fn test_distinct_units_pass_ownership() {
        let modules = vec![module("a", "/ws/a/classes"), module("b", "/ws/b/classes")];
        let units = vec![
            unit("a", "/ws/a/classes", "com/X.class"),
            unit("b", "/ws/b/classes", "com/X.class"),
        ];
        assert!(check_ownership(&units, &modules).is_ok());
    }
}
