use crate::domain::model::{
    AggregatedReport, CompiledUnit, CounterSet, LineStatus, Module, ModuleCoverage, TraceSet,
    UnitCoverage,
};
use std::collections::BTreeMap;

/// Counters of a single unit. Without usable hits every countable element is
/// reported as missed.
pub fn unit_coverage(unit: &CompiledUnit, hits: Option<&[bool]>) -> UnitCoverage {
    let expected = unit.probes.probe_count();
    let hits = match hits {
        Some(hits) if hits.len() == expected => Some(hits),
        Some(hits) => {
            tracing::warn!(
                "Execution data for {}:{} has {} probes but the unit has {}; treating it as not executed",
                unit.module,
                unit.id,
                hits.len(),
                expected
            );
            None
        }
        None => None,
    };
    let is_hit = |probe: usize| hits.is_some_and(|h| h[probe]);

    let mut counters = CounterSet::default();
    // line -> (probes hit, probes total)
    let mut lines: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    let mut class_hit = false;
    let mut probe_id = 0;

    for method in &unit.probes.methods {
        let mut method_hit = false;
        for probe in &method.probes {
            let hit = is_hit(probe_id);
            probe_id += 1;

            method_hit |= hit;
            let line = lines.entry(probe.line).or_insert((0, 0));
            line.1 += 1;
            if hit {
                line.0 += 1;
            }
            if probe.branch {
                counters.branch.record(hit);
            }
        }
        counters.method.record(method_hit);
        class_hit |= method_hit;
    }
    counters.class.record(class_hit);

    let lines = lines
        .into_iter()
        .map(|(line, (hit, total))| {
            counters.line.record(hit > 0);
            let status = if hit == 0 {
                LineStatus::Missed
            } else if hit == total {
                LineStatus::Covered
            } else {
                LineStatus::Partial
            };
            (line, status)
        })
        .collect();

    UnitCoverage {
        id: unit.id.clone(),
        source_file: unit.probes.source_file.clone(),
        source_path: unit.source_path.clone(),
        counters,
        lines,
    }
}

/// Builds the cross-module report over `units`. Result does not depend on
/// the order of `modules` or `units`.
pub fn aggregate<'a>(
    name: &str,
    modules: &[Module],
    units: impl IntoIterator<Item = &'a CompiledUnit>,
    traces: &TraceSet,
) -> AggregatedReport {
    let mut coverage: BTreeMap<String, ModuleCoverage> = modules
        .iter()
        .map(|m| {
            (
                m.name.clone(),
                ModuleCoverage {
                    name: m.name.clone(),
                    source_roots: m.source_roots.clone(),
                    class_roots: m.class_roots.clone(),
                    counters: CounterSet::default(),
                    units: BTreeMap::new(),
                },
            )
        })
        .collect();

    for unit in units {
        let Some(module) = coverage.get_mut(&unit.module) else {
            tracing::warn!("Unit {} belongs to unknown module {}", unit.id, unit.module);
            continue;
        };
        let unit_cov = unit_coverage(unit, traces.get(&unit.module, &unit.id));
        module.units.insert(unit_cov.id.clone(), unit_cov);
    }

    for module in coverage.values_mut() {
        module.counters = module.units.values().map(|u| u.counters).sum();
    }
    let totals = coverage.values().map(|m| m.counters).sum();

    AggregatedReport {
        name: name.to_string(),
        totals,
        modules: coverage,
        sessions: traces.sessions().cloned().collect(),
    }
}
