use crate::domain::model::{AggregatedReport, CounterSet};
use html_escape::encode_double_quoted_attribute as attr;
use std::fmt::Write;

fn write_counters(out: &mut String, indent: &str, counters: &CounterSet, keep_empty: bool) {
    for (kind, counter) in counters.iter() {
        if counter.total() == 0 && !keep_empty {
            continue;
        }
        let _ = writeln!(
            out,
            r#"{}<counter type="{}" missed="{}" covered="{}"/>"#,
            indent,
            kind,
            counter.missed,
            counter.covered
        );
    }
}

/// Structured document. Bundle counters come right after the session list,
/// before any module detail, and always list all four kinds. Each group
/// opens with its own counters, ahead of its classes.
pub fn render_xml(report: &AggregatedReport) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    let _ = writeln!(out, r#"<report name="{}">"#, attr(&report.name));

    for session in &report.sessions {
        let _ = writeln!(
            out,
            r#"  <sessioninfo id="{}" start="{}" dump="{}"/>"#,
            attr(&session.id),
            session.start.timestamp_millis(),
            session.dump.timestamp_millis()
        );
    }

    write_counters(&mut out, "  ", &report.totals, true);

    for module in report.modules.values() {
        let _ = writeln!(out, r#"  <group name="{}">"#, attr(&module.name));
        write_counters(&mut out, "    ", &module.counters, false);
        for unit in module.units.values() {
            match &unit.source_file {
                Some(source) => {
                    let _ = writeln!(
                        out,
                        r#"    <class name="{}" sourcefilename="{}">"#,
                        attr(&unit.id),
                        attr(source)
                    );
                }
                None => {
                    let _ = writeln!(out, r#"    <class name="{}">"#, attr(&unit.id));
                }
            }
            write_counters(&mut out, "      ", &unit.counters, false);
            out.push_str("    </class>\n");
        }
        out.push_str("  </group>\n");
    }

    out.push_str("</report>\n");
    out
}
