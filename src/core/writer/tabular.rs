use crate::domain::model::{AggregatedReport, CounterKind, CounterSet, Scope};
use crate::utils::error::{CoverageError, Result};
use serde::{Deserialize, Serialize};

/// One row of the CSV export. `group` is the bundle name for bundle rows
/// and the module name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRow {
    pub scope: Scope,
    pub group: String,
    pub counter: CounterKind,
    pub covered: u64,
    pub missed: u64,
    pub total: u64,
}

fn rows_for<'a>(scope: Scope, group: &'a str, counters: &'a CounterSet) -> impl Iterator<Item = CounterRow> + 'a {
    counters.iter().map(move |(counter, c)| CounterRow {
        scope,
        group: group.to_string(),
        counter,
        covered: c.covered,
        missed: c.missed,
        total: c.total(),
    })
}

/// Bundle rows first, then four rows per module in name order.
pub fn counter_rows(report: &AggregatedReport) -> Vec<CounterRow> {
    let mut rows: Vec<CounterRow> = rows_for(Scope::Bundle, &report.name, &report.totals).collect();
    for module in report.modules.values() {
        rows.extend(rows_for(Scope::Module, &module.name, &module.counters));
    }
    rows
}

pub fn render_csv(report: &AggregatedReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in counter_rows(report) {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| CoverageError::IoError(e.into_error()))
}

/// Reads rows back from a CSV export.
pub fn parse_csv(data: &[u8]) -> Result<Vec<CounterRow>> {
    let mut reader = csv::Reader::from_reader(data);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<CounterRow>, _>>()?;
    Ok(rows)
}
