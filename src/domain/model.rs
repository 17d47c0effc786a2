use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::str::FromStr;

/// Granularity a coverage counter is measured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterKind {
    Line,
    Branch,
    Class,
    Method,
}

impl CounterKind {
    pub const ALL: [CounterKind; 4] = [
        CounterKind::Line,
        CounterKind::Branch,
        CounterKind::Class,
        CounterKind::Method,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Line => "LINE",
            CounterKind::Branch => "BRANCH",
            CounterKind::Class => "CLASS",
            CounterKind::Method => "METHOD",
        }
    }

    /// Plural label used in console summaries.
    pub fn label(&self) -> &'static str {
        match self {
            CounterKind::Line => "Lines",
            CounterKind::Branch => "Branches",
            CounterKind::Class => "Classes",
            CounterKind::Method => "Methods",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LINE" => Ok(CounterKind::Line),
            "BRANCH" => Ok(CounterKind::Branch),
            "CLASS" => Ok(CounterKind::Class),
            "METHOD" => Ok(CounterKind::Method),
            other => Err(format!(
                "unknown counter '{}', expected one of LINE, BRANCH, CLASS, METHOD",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounter {
    pub covered: u64,
    pub missed: u64,
}

impl CoverageCounter {
    pub fn new(covered: u64, missed: u64) -> Self {
        Self { covered, missed }
    }

    pub fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// Covered ratio, `None` when there is nothing to measure.
    pub fn ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.covered as f64 / total as f64),
        }
    }

    pub fn record(&mut self, hit: bool) {
        if hit {
            self.covered += 1;
        } else {
            self.missed += 1;
        }
    }
}

impl AddAssign for CoverageCounter {
    fn add_assign(&mut self, rhs: Self) {
        self.covered += rhs.covered;
        self.missed += rhs.missed;
    }
}

/// One counter per [`CounterKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSet {
    pub line: CoverageCounter,
    pub branch: CoverageCounter,
    pub class: CoverageCounter,
    pub method: CoverageCounter,
}

impl CounterSet {
    pub fn get(&self, kind: CounterKind) -> CoverageCounter {
        match kind {
            CounterKind::Line => self.line,
            CounterKind::Branch => self.branch,
            CounterKind::Class => self.class,
            CounterKind::Method => self.method,
        }
    }

    pub fn get_mut(&mut self, kind: CounterKind) -> &mut CoverageCounter {
        match kind {
            CounterKind::Line => &mut self.line,
            CounterKind::Branch => &mut self.branch,
            CounterKind::Class => &mut self.class,
            CounterKind::Method => &mut self.method,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CounterKind, CoverageCounter)> + '_ {
        CounterKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

impl AddAssign for CounterSet {
    fn add_assign(&mut self, rhs: Self) {
        for kind in CounterKind::ALL {
            *self.get_mut(kind) += rhs.get(kind);
        }
    }
}

impl std::iter::Sum for CounterSet {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(CounterSet::default(), |mut acc, set| {
            acc += set;
            acc
        })
    }
}

/// A build module with its resolved (absolute) input locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub root: PathBuf,
    pub source_roots: Vec<PathBuf>,
    pub class_roots: Vec<PathBuf>,
    pub exec_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub line: u32,
    #[serde(default)]
    pub branch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodProbes {
    pub name: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub probes: Vec<Probe>,
}

/// Static description of what a compiled unit contains. Probe ids are the
/// positions of the probes when walking methods in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeMap {
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodProbes>,
}

impl ProbeMap {
    pub fn probe_count(&self) -> usize {
        self.methods.iter().map(|m| m.probes.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub module: String,
    /// Path relative to the class root, `/`-separated, extension stripped.
    pub id: String,
    /// Path relative to the class root including the extension; exclusion
    /// patterns are matched against this.
    pub relative_path: String,
    pub file: PathBuf,
    pub source_path: Option<PathBuf>,
    pub probes: ProbeMap,
}

impl CompiledUnit {
    /// Package directory of the unit, e.g. `com/acme` for `com/acme/Foo`.
    pub fn package(&self) -> &str {
        self.id.rsplit_once('/').map(|(pkg, _)| pkg).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub start: DateTime<Utc>,
    pub dump: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceKey {
    pub module: String,
    pub unit: String,
}

impl TraceKey {
    pub fn new(module: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            unit: unit.into(),
        }
    }
}

/// Two records for one unit disagree on how many probes it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeMismatch {
    pub key: TraceKey,
    pub expected: usize,
    pub found: usize,
}

/// Probe hits keyed by (module, unit). Probes are binary, so merging is a
/// union: a probe is hit if any record saw it hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSet {
    probes: BTreeMap<TraceKey, Vec<bool>>,
    sessions: BTreeSet<SessionInfo>,
}

impl TraceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        key: TraceKey,
        hits: Vec<bool>,
    ) -> std::result::Result<(), ProbeMismatch> {
        match self.probes.get_mut(&key) {
            Some(existing) if existing.len() != hits.len() => Err(ProbeMismatch {
                expected: existing.len(),
                found: hits.len(),
                key,
            }),
            Some(existing) => {
                for (slot, hit) in existing.iter_mut().zip(hits) {
                    *slot |= hit;
                }
                Ok(())
            }
            None => {
                self.probes.insert(key, hits);
                Ok(())
            }
        }
    }

    pub fn add_session(&mut self, session: SessionInfo) {
        self.sessions.insert(session);
    }

    pub fn merge(&mut self, other: TraceSet) -> std::result::Result<(), ProbeMismatch> {
        for (key, hits) in other.probes {
            self.insert(key, hits)?;
        }
        self.sessions.extend(other.sessions);
        Ok(())
    }

    pub fn get(&self, module: &str, unit: &str) -> Option<&[bool]> {
        self.probes
            .get(&TraceKey::new(module, unit))
            .map(Vec::as_slice)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionInfo> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// Per-line status used by the browsable report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Covered,
    Partial,
    Missed,
}

impl LineStatus {
    pub fn css_class(&self) -> &'static str {
        match self {
            LineStatus::Covered => "fc",
            LineStatus::Partial => "pc",
            LineStatus::Missed => "nc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCoverage {
    pub id: String,
    pub source_file: Option<String>,
    pub source_path: Option<PathBuf>,
    pub counters: CounterSet,
    pub lines: BTreeMap<u32, LineStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCoverage {
    pub name: String,
    pub source_roots: Vec<PathBuf>,
    pub class_roots: Vec<PathBuf>,
    pub counters: CounterSet,
    pub units: BTreeMap<String, UnitCoverage>,
}

/// Cross-module coverage for one run. Built once, read by the writer and
/// the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedReport {
    pub name: String,
    pub totals: CounterSet,
    pub modules: BTreeMap<String, ModuleCoverage>,
    pub sessions: Vec<SessionInfo>,
}

impl AggregatedReport {
    pub fn unit_count(&self) -> usize {
        self.modules.values().map(|m| m.units.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub counter: CounterKind,
    pub minimum: f64,
}

impl ThresholdRule {
    pub fn new(counter: CounterKind, minimum: f64) -> Self {
        Self { counter, minimum }
    }

    /// LINE 70%, BRANCH 60%, CLASS 80% across the whole bundle.
    pub fn defaults() -> Vec<ThresholdRule> {
        vec![
            ThresholdRule::new(CounterKind::Line, 0.70),
            ThresholdRule::new(CounterKind::Branch, 0.60),
            ThresholdRule::new(CounterKind::Class, 0.80),
        ]
    }
}

/// What a counter row or rule outcome was measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Bundle,
    Module,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub scope: Scope,
    /// Bundle or module name the rule was evaluated for.
    pub subject: String,
    pub rule: ThresholdRule,
    pub counter: CoverageCounter,
    pub passed: bool,
}

impl RuleOutcome {
    pub fn observed(&self) -> Option<f64> {
        self.counter.ratio()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub bundle: String,
    pub outcomes: Vec<RuleOutcome>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn violations(&self) -> Vec<String> {
        self.failures()
            .map(|o| {
                format!(
                    "Rule violated for bundle {}: {} covered ratio is {:.2}, but expected minimum is {:.2}",
                    o.subject,
                    o.rule.counter.label().to_lowercase(),
                    o.observed().unwrap_or(0.0),
                    o.rule.minimum
                )
            })
            .collect()
    }
}
