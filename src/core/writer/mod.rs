//! Report serialization.
//!
//! Rendering is pure: an [`AggregatedReport`] becomes a list of files with
//! their contents. Writing those files is done through a [`Storage`], after
//! aggregation has finished.

pub mod html;
pub mod tabular;
pub mod xml;

use crate::domain::model::{AggregatedReport, CoverageCounter};
use crate::domain::ports::{ReportPaths, Storage};
use crate::utils::error::{CoverageError, Result};

pub const XML_REPORT: &str = "coverage-report.xml";
pub const CSV_REPORT: &str = "coverage-report.csv";
pub const HTML_INDEX: &str = "html/index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: String,
    pub contents: Vec<u8>,
}

impl RenderedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// All three representations of `report`.
pub fn render_all(report: &AggregatedReport) -> Result<Vec<RenderedFile>> {
    let mut files = vec![
        RenderedFile::new(XML_REPORT, xml::render_xml(report)),
        RenderedFile::new(CSV_REPORT, tabular::render_csv(report)?),
    ];
    files.extend(html::render_html(report));
    Ok(files)
}

pub async fn write_reports<S: Storage>(storage: &S, report: &AggregatedReport) -> Result<ReportPaths> {
    let files = render_all(report)?;
    tracing::debug!("Writing {} report files", files.len());

    for file in &files {
        storage
            .write_file(&file.path, &file.contents)
            .await
            .map_err(|e| match e {
                CoverageError::IoError(source) => CoverageError::ReportWrite {
                    path: storage.resolve(&file.path),
                    source,
                },
                other => other,
            })?;
    }

    Ok(ReportPaths {
        xml: storage.resolve(XML_REPORT),
        html_index: storage.resolve(HTML_INDEX),
        csv: storage.resolve(CSV_REPORT),
    })
}

pub(crate) fn percent(counter: CoverageCounter) -> String {
    match counter.ratio() {
        Some(ratio) => format!("{:.2}%", ratio * 100.0),
        None => "n/a".to_string(),
    }
}
