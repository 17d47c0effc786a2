use coverage_rollup::core::exec_data::{ExecFile, ExecRecord};
use coverage_rollup::core::engine::report_banner;
use coverage_rollup::core::summary::{extract_module_summaries, read_summary};
use coverage_rollup::core::writer::tabular::parse_csv;
use coverage_rollup::domain::model::{
    CounterKind, CoverageCounter, MethodProbes, Probe, ProbeMap, Scope, SessionInfo,
};
use coverage_rollup::{
    CoverageConfig, CoverageEngine, CoverageError, CoveragePipeline, LocalStorage, RunMode,
    TomlConfig,
};
use chrono::{TimeZone, Utc};
use std::path::Path;
use tempfile::TempDir;

/// One method per unit with one probe per line, lines numbered from 1.
fn write_unit(class_root: &Path, relative: &str, lines: u32) {
    let probes = ProbeMap {
        source_file: Some(format!(
            "{}.java",
            relative.rsplit('/').next().unwrap().trim_end_matches(".class")
        )),
        methods: vec![MethodProbes {
            name: "run".to_string(),
            line: Some(1),
            probes: (1..=lines).map(|line| Probe { line, branch: false }).collect(),
        }],
    };
    let path = class_root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec(&probes).unwrap()).unwrap();
}

fn write_exec(exec_dir: &Path, file: &str, records: Vec<(&str, Vec<bool>)>) {
    let start = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
    let exec = ExecFile::new(
        vec![SessionInfo {
            id: file.to_string(),
            start,
            dump: start,
        }],
        records
            .into_iter()
            .map(|(name, probes)| ExecRecord {
                name: name.to_string(),
                probes,
            })
            .collect(),
    );
    let path = exec_dir.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec(&exec).unwrap()).unwrap();
}

fn hits(total: usize, hit: usize) -> Vec<bool> {
    (0..total).map(|i| i < hit).collect()
}

fn config(root: &Path, toml: &str) -> CoverageConfig {
    let config = TomlConfig::from_toml_str(toml).unwrap();
    config.resolve(root)
}

const TWO_MODULES: &str = r#"
[project]
name = "shop"
output_dir = "out"

[[modules]]
name = "orders"

[[modules]]
name = "billing"

[[verification.rules]]
counter = "LINE"
minimum = 0.60
"#;

fn two_module_workspace(dir: &Path) {
    let orders = dir.join("orders/build/classes/java/main");
    let billing = dir.join("billing/build/classes/java/main");
    write_unit(&orders, "com/acme/orders/OrderService.class", 100);
    write_unit(&billing, "com/acme/billing/Invoice.class", 100);
    write_exec(
        &dir.join("orders/build/jacoco"),
        "test.exec",
        vec![("com/acme/orders/OrderService", hits(100, 50))],
    );
    write_exec(
        &dir.join("billing/build/jacoco"),
        "test.exec",
        vec![("com/acme/billing/Invoice", hits(100, 20))],
    );
}

fn engine(config: CoverageConfig) -> CoverageEngine<CoveragePipeline<LocalStorage, CoverageConfig>> {
    let storage = LocalStorage::new(config.output_dir.clone());
    CoverageEngine::new(CoveragePipeline::new(storage, config))
}

#[tokio::test]
async fn test_two_module_bundle_fails_line_threshold() {
    let dir = TempDir::new().unwrap();
    two_module_workspace(dir.path());

    let outcome = engine(config(dir.path(), TWO_MODULES))
        .run(RunMode::Check)
        .await
        .unwrap();

    assert_eq!(outcome.report.totals.line, CoverageCounter::new(70, 130));
    let verification = outcome.verification.as_ref().unwrap();
    assert!(!verification.passed());
    assert_eq!(verification.outcomes[0].observed(), Some(0.35));
    assert_eq!(
        verification.violations(),
        vec!["Rule violated for bundle shop: lines covered ratio is 0.35, but expected minimum is 0.60".to_string()]
    );
}

#[tokio::test]
async fn test_per_module_rules_fail_weak_module_behind_passing_bundle() {
    let dir = TempDir::new().unwrap();
    two_module_workspace(dir.path());
    let toml = r#"
[project]
name = "shop"
output_dir = "out"

[[modules]]
name = "orders"

[[modules]]
name = "billing"

[verification]
per_module = true

[[verification.rules]]
counter = "LINE"
minimum = 0.30
"#;

    let outcome = engine(config(dir.path(), toml))
        .run(RunMode::Check)
        .await
        .unwrap();

    let verification = outcome.verification.as_ref().unwrap();
    let bundle = verification
        .outcomes
        .iter()
        .find(|o| o.scope == Scope::Bundle)
        .unwrap();
    assert!(bundle.passed);
    assert!(!verification.passed());
    assert_eq!(
        verification.violations(),
        vec!["Rule violated for bundle billing: lines covered ratio is 0.20, but expected minimum is 0.30".to_string()]
    );

    let banner = report_banner(outcome.paths.as_ref().unwrap());
    assert!(banner.contains(&"Coverage for billing:".to_string()));
    assert!(banner.contains(&"   Lines:    20.00% (20/100)".to_string()));
    assert!(banner.contains(&"Coverage for orders:".to_string()));
}

#[tokio::test]
async fn test_all_formats_agree_with_aggregate() {
    let dir = TempDir::new().unwrap();
    two_module_workspace(dir.path());

    let outcome = engine(config(dir.path(), TWO_MODULES))
        .run(RunMode::Report)
        .await
        .unwrap();
    let paths = outcome.paths.unwrap();
    assert!(paths.html_index.is_file());

    let summary = read_summary(&paths.xml).unwrap();
    let rows = parse_csv(&std::fs::read(&paths.csv).unwrap()).unwrap();
    for kind in CounterKind::ALL {
        let expected = outcome.report.totals.get(kind);
        if expected.total() > 0 {
            assert_eq!(summary.get(kind), Some(expected), "{kind} in XML");
        }
        let row = rows
            .iter()
            .find(|r| r.scope == Scope::Bundle && r.counter == kind)
            .unwrap();
        assert_eq!(row.group, "shop");
        assert_eq!((row.covered, row.missed), (expected.covered, expected.missed), "{kind} in CSV");
    }
    assert_eq!(summary.lines()[0], "Lines:    35.00% (70/200)");

    let xml = std::fs::read_to_string(&paths.xml).unwrap();
    let module_summaries = extract_module_summaries(&xml);
    assert_eq!(module_summaries.len(), outcome.report.modules.len());
    for (name, module) in &outcome.report.modules {
        let from_xml = &module_summaries.iter().find(|(n, _)| n == name).unwrap().1;
        for kind in CounterKind::ALL {
            let expected = module.counters.get(kind);
            let row = rows
                .iter()
                .find(|r| r.scope == Scope::Module && &r.group == name && r.counter == kind)
                .unwrap();
            assert_eq!((row.covered, row.missed), (expected.covered, expected.missed), "{name} {kind} in CSV");
            if expected.total() > 0 {
                assert_eq!(from_xml.get(kind), Some(expected), "{name} {kind} in XML");
            }
        }
    }
    assert_eq!(rows.len(), 4 * (1 + outcome.report.modules.len()));

    let module_page = paths.html_index.parent().unwrap().join("orders/index.html");
    assert!(module_page.is_file());
}

#[tokio::test]
async fn test_excluded_units_are_absent_from_every_format() {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("orders/build/classes/java/main");
    write_unit(&classes, "com/acme/OrderService.class", 10);
    write_unit(&classes, "com/acme/dto/OrderDto.class", 10);
    write_unit(&classes, "com/acme/QOrder.class", 10);
    write_unit(&classes, "com/acme/OrderApplication.class", 10);
    write_exec(
        &dir.path().join("orders/build/jacoco"),
        "test.exec",
        vec![
            ("com/acme/OrderService", hits(10, 5)),
            ("com/acme/dto/OrderDto", hits(10, 10)),
        ],
    );

    let toml = "[project]\nname = \"shop\"\noutput_dir = \"out\"\n[[modules]]\nname = \"orders\"\n";
    let outcome = engine(config(dir.path(), toml))
        .run(RunMode::Check)
        .await
        .unwrap();

    assert_eq!(outcome.report.unit_count(), 1);
    assert_eq!(outcome.report.totals.line, CoverageCounter::new(5, 5));
    assert_eq!(outcome.report.totals.class, CoverageCounter::new(1, 0));

    let paths = outcome.paths.unwrap();
    let xml = std::fs::read_to_string(&paths.xml).unwrap();
    assert!(!xml.contains("OrderDto"));
    assert!(!xml.contains("QOrder"));
    assert!(!xml.contains("OrderApplication"));
    let csv = std::fs::read_to_string(&paths.csv).unwrap();
    assert!(csv.contains("LINE,5,5,10"));
}

#[tokio::test]
async fn test_module_without_execution_data_is_fully_missed() {
    let dir = TempDir::new().unwrap();
    write_unit(&dir.path().join("orders/build/classes/java/main"), "com/acme/A.class", 4);
    write_unit(&dir.path().join("common/build/classes/java/main"), "com/acme/B.class", 6);
    write_exec(
        &dir.path().join("orders/build/jacoco"),
        "test.exec",
        vec![("com/acme/A", hits(4, 4))],
    );

    let toml = "[project]\nname = \"shop\"\n[[modules]]\nname = \"orders\"\n[[modules]]\nname = \"common\"\n";
    let outcome = engine(config(dir.path(), toml))
        .run(RunMode::Verify)
        .await
        .unwrap();

    assert_eq!(outcome.report.modules["common"].counters.line, CoverageCounter::new(0, 6));
    assert_eq!(outcome.report.totals.line, CoverageCounter::new(4, 6));
    assert!(outcome.paths.is_none());
}

#[tokio::test]
async fn test_repeated_runs_merge_as_union() {
    let dir = TempDir::new().unwrap();
    let exec_dir = dir.path().join("orders/build/jacoco");
    write_unit(&dir.path().join("orders/build/classes/java/main"), "com/acme/A.class", 4);
    write_exec(&exec_dir, "unit.exec", vec![("com/acme/A", vec![true, true, false, false])]);
    write_exec(&exec_dir, "it/integration.exec", vec![("com/acme/A", vec![true, false, true, false])]);

    let toml = "[project]\nname = \"shop\"\n[[modules]]\nname = \"orders\"\n";
    let outcome = engine(config(dir.path(), toml))
        .run(RunMode::Verify)
        .await
        .unwrap();

    assert_eq!(outcome.report.totals.line, CoverageCounter::new(3, 1));
    assert_eq!(outcome.report.sessions.len(), 2);
}

#[tokio::test]
async fn test_corrupt_execution_data_aborts_before_writing() {
    let dir = TempDir::new().unwrap();
    two_module_workspace(dir.path());
    std::fs::write(dir.path().join("billing/build/jacoco/broken.exec"), b"{\"format\":").unwrap();

    let config = config(dir.path(), TWO_MODULES);
    let output_dir = config.output_dir.clone();
    let err = engine(config).run(RunMode::Check).await.unwrap_err();

    assert!(matches!(err, CoverageError::DataCorrupt { .. }));
    assert!(err.is_fatal());
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_overlapping_class_roots_are_ambiguous() {
    let dir = TempDir::new().unwrap();
    write_unit(&dir.path().join("orders/classes"), "shared/Overlap.class", 2);

    let toml = r#"
[project]
name = "shop"

[[modules]]
name = "orders"
class_roots = ["classes"]

[[modules]]
name = "shared"
path = "orders/classes/shared"
class_roots = ["."]
"#;
    let err = engine(config(dir.path(), toml))
        .run(RunMode::Verify)
        .await
        .unwrap_err();

    match err {
        CoverageError::AmbiguousUnit { owners, .. } => assert_eq!(owners.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}
