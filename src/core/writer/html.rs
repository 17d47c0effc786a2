use super::{percent, RenderedFile, HTML_INDEX};
use crate::domain::model::{AggregatedReport, CounterKind, CounterSet, ModuleCoverage, UnitCoverage};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:.3em .6em;text-align:right}\
td:first-child,th:first-child{text-align:left}\
pre.source span{display:block}\
.fc{background:#ccffcc}.pc{background:#ffffcc}.nc{background:#ffcccc}";

/// Directory-safe form of a module name. Names made only of dots, and
/// the name of the index page itself, get a `_` prefix so a module page can
/// never land on `html/index.html`.
fn module_dir(name: &str) -> String {
    let dir: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if dir.chars().all(|c| c == '.') || dir == "index.html" {
        format!("_{}", dir)
    } else {
        dir
    }
}

/// One distinct directory per module. Names that sanitize to the same
/// directory get a `-2`, `-3`, ... suffix in module name order.
fn module_dirs(report: &AggregatedReport) -> BTreeMap<&str, String> {
    let mut taken = BTreeSet::new();
    let mut dirs = BTreeMap::new();
    for name in report.modules.keys() {
        let base = module_dir(name);
        let mut dir = base.clone();
        let mut n = 2;
        while !taken.insert(dir.clone()) {
            dir = format!("{}-{}", base, n);
            n += 1;
        }
        dirs.insert(name.as_str(), dir);
    }
    dirs
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        text(title),
        STYLE,
        body
    )
}

fn header_cells() -> String {
    CounterKind::ALL
        .iter()
        .map(|k| format!("<th>{}</th><th>Missed</th>", k.label()))
        .collect()
}

fn counter_cells(counters: &CounterSet) -> String {
    counters
        .iter()
        .map(|(_, c)| format!("<td>{}</td><td>{}/{}</td>", percent(c), c.missed, c.total()))
        .collect()
}

fn render_index(report: &AggregatedReport, dirs: &BTreeMap<&str, String>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", text(&report.name));
    let _ = writeln!(body, "<table>\n<tr><th>Module</th>{}</tr>", header_cells());
    for module in report.modules.values() {
        let _ = writeln!(
            body,
            "<tr><td><a href=\"{}/index.html\">{}</a></td>{}</tr>",
            attr(dirs.get(module.name.as_str()).map_or("", String::as_str)),
            text(&module.name),
            counter_cells(&module.counters)
        );
    }
    let _ = writeln!(
        body,
        "<tr><th>Total</th>{}</tr>\n</table>",
        counter_cells(&report.totals)
    );

    if !report.sessions.is_empty() {
        body.push_str("<h2>Sessions</h2>\n<table>\n<tr><th>Session</th><th>Start</th><th>Dump</th></tr>\n");
        for session in &report.sessions {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                text(&session.id),
                session.start.to_rfc3339(),
                session.dump.to_rfc3339()
            );
        }
        body.push_str("</table>\n");
    }

    page(&report.name, &body)
}

fn render_module(module: &ModuleCoverage, linked: &[&str]) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<p><a href=\"../index.html\">Index</a></p>\n<h1>{}</h1>",
        text(&module.name)
    );

    if !module.source_roots.is_empty() {
        body.push_str("<p>Sources:</p>\n<ul>\n");
        for root in &module.source_roots {
            let _ = writeln!(body, "<li>{}</li>", text(&root.display().to_string()));
        }
        body.push_str("</ul>\n");
    }

    let _ = writeln!(body, "<table>\n<tr><th>Class</th>{}</tr>", header_cells());
    for unit in module.units.values() {
        let name = if linked.contains(&unit.id.as_str()) {
            format!("<a href=\"{}.html\">{}</a>", attr(&unit.id), text(&unit.id))
        } else {
            text(&unit.id).into_owned()
        };
        let _ = writeln!(body, "<tr><td>{}</td>{}</tr>", name, counter_cells(&unit.counters));
    }
    let _ = writeln!(
        body,
        "<tr><th>Total</th>{}</tr>\n</table>",
        counter_cells(&module.counters)
    );

    page(&module.name, &body)
}

fn render_source(unit: &UnitCoverage, source: &str) -> String {
    let depth = unit.id.matches('/').count();
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<p><a href=\"{}index.html\">Module</a></p>\n<h1>{}</h1>\n<pre class=\"source\">",
        "../".repeat(depth),
        text(unit.source_file.as_deref().unwrap_or(&unit.id))
    );

    for (idx, line) in source.lines().enumerate() {
        let nr = idx as u32 + 1;
        match unit.lines.get(&nr) {
            Some(status) => {
                let _ = writeln!(
                    body,
                    "<span class=\"{}\" id=\"L{}\">{}</span>",
                    status.css_class(),
                    nr,
                    text(line)
                );
            }
            None => {
                let _ = writeln!(body, "<span id=\"L{}\">{}</span>", nr, text(line));
            }
        }
    }
    body.push_str("</pre>\n");

    page(&unit.id, &body)
}

/// Index page, one page per module and a highlighted source page for every
/// unit whose source file could be read.
pub fn render_html(report: &AggregatedReport) -> Vec<RenderedFile> {
    let dirs = module_dirs(report);
    let mut files = vec![RenderedFile::new(HTML_INDEX, render_index(report, &dirs))];

    for module in report.modules.values() {
        let dir = format!("html/{}", dirs.get(module.name.as_str()).map_or("", String::as_str));
        let mut linked = Vec::new();

        for unit in module.units.values() {
            let Some(path) = &unit.source_path else {
                continue;
            };
            match std::fs::read_to_string(path) {
                Ok(source) => {
                    files.push(RenderedFile::new(
                        format!("{}/{}.html", dir, unit.id),
                        render_source(unit, &source),
                    ));
                    linked.push(unit.id.as_str());
                }
                Err(e) => tracing::warn!("Skipping source page for {}: {}", path.display(), e),
            }
        }

        files.push(RenderedFile::new(
            format!("{}/index.html", dir),
            render_module(module, &linked),
        ));
    }

    files
}
