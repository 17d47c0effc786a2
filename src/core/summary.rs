//! Console summary re-derived from the XML report on disk.
//!
//! This deliberately does not look at the in-memory aggregate: reading the
//! serialized document back catches writer bugs that an in-memory summary
//! would hide.

use crate::domain::model::{CounterKind, CoverageCounter};
use crate::utils::error::{CoverageError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

fn counter_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<counter\b[^>]*>").expect("valid counter tag pattern"))
}

fn group_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<group\b[^>]*?\bname\s*=\s*"([^"]*)"[^>]*>"#).expect("valid group tag pattern"))
}

fn attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#).expect("valid attribute pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryEntry {
    pub kind: CounterKind,
    pub counter: CoverageCounter,
}

impl SummaryEntry {
    /// `Lines:    35.00% (70/200)`
    pub fn render(&self) -> String {
        let total = self.counter.total();
        let pct = self.counter.ratio().unwrap_or(0.0) * 100.0;
        format!(
            "{:<10}{:.2}% ({}/{})",
            format!("{}:", self.kind.label()),
            pct,
            self.counter.covered,
            total
        )
    }
}

/// Counters found in a report document, in [`CounterKind::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSummary {
    pub entries: Vec<SummaryEntry>,
}

impl CoverageSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, kind: CounterKind) -> Option<CoverageCounter> {
        self.entries.iter().find(|e| e.kind == kind).map(|e| e.counter)
    }

    /// One line per kind that has something to measure.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.counter.total() > 0)
            .map(SummaryEntry::render)
            .collect()
    }
}

fn parse_tag(tag: &str) -> Option<(CounterKind, Option<u64>, Option<u64>)> {
    let mut kind = None;
    let mut covered = None;
    let mut missed = None;
    for caps in attribute().captures_iter(tag) {
        match &caps[1] {
            "type" => kind = caps[2].parse::<CounterKind>().ok(),
            "covered" => covered = caps[2].parse::<u64>().ok(),
            "missed" => missed = caps[2].parse::<u64>().ok(),
            _ => {}
        }
    }
    kind.map(|k| (k, covered, missed))
}

/// Scans every `<counter>` tag; the first tag of each kind wins. Attribute
/// order does not matter. A winning tag without numeric `covered` and
/// `missed` leaves its kind out.
pub fn extract_summary(content: &str) -> CoverageSummary {
    let mut first: BTreeMap<CounterKind, Option<CoverageCounter>> = BTreeMap::new();

    for tag in counter_tag().find_iter(content) {
        let Some((kind, covered, missed)) = parse_tag(tag.as_str()) else {
            continue;
        };
        first.entry(kind).or_insert(match (covered, missed) {
            (Some(covered), Some(missed)) => Some(CoverageCounter::new(covered, missed)),
            _ => None,
        });
    }

    let entries = CounterKind::ALL
        .into_iter()
        .filter_map(|kind| {
            first
                .get(&kind)
                .copied()
                .flatten()
                .map(|counter| SummaryEntry { kind, counter })
        })
        .collect();

    CoverageSummary { entries }
}

/// Per-module summaries, one for each `<group>` section in document order.
/// Inside a section the same first-tag-wins rule applies, and groups open
/// with their own counters. Sections without counters are left out.
pub fn extract_module_summaries(content: &str) -> Vec<(String, CoverageSummary)> {
    let mut modules = Vec::new();
    for caps in group_tag().captures_iter(content) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let body = &content[tag.end()..];
        let body = body.find("</group>").map_or(body, |end| &body[..end]);

        let summary = extract_summary(body);
        if !summary.is_empty() {
            let name = html_escape::decode_html_entities(&caps[1]).into_owned();
            modules.push((name, summary));
        }
    }
    modules
}

pub fn read_summary(path: &Path) -> Result<CoverageSummary> {
    let content = std::fs::read_to_string(path).map_err(|e| CoverageError::SummaryParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let summary = extract_summary(&content);
    if summary.is_empty() {
        return Err(CoverageError::SummaryParse {
            path: path.to_path_buf(),
            reason: "no counter sections found".to_string(),
        });
    }
    Ok(summary)
}

/// Summary block for the console. A document that cannot be summarized is
/// logged and yields no lines.
pub fn summary_block(path: &Path) -> Vec<String> {
    match read_summary(path) {
        Ok(summary) => {
            let mut block = vec!["Coverage Summary:".to_string(), "-".repeat(30)];
            block.extend(summary.lines());
            block
        }
        Err(e) => {
            tracing::warn!("Coverage summary parsing failed: {}", e);
            Vec::new()
        }
    }
}

/// One block per module, printed after the bundle summary. Unreadable
/// documents were already reported by [`summary_block`] and yield nothing.
pub fn module_summary_blocks(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for (name, summary) in extract_module_summaries(&content) {
        let summary_lines = summary.lines();
        if summary_lines.is_empty() {
            continue;
        }
        lines.push(format!("Coverage for {}:", name));
        lines.extend(summary_lines.into_iter().map(|line| format!("   {}", line)));
    }
    lines
}

pub fn print_summary(path: &Path) {
    for line in summary_block(path) {
        println!("{}", line);
    }
}
