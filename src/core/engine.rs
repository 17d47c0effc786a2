use crate::core::summary::{module_summary_blocks, summary_block};
use crate::domain::model::{AggregatedReport, VerificationResult};
use crate::domain::ports::{ModuleInput, Pipeline, ReportPaths};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write reports only.
    Report,
    /// Evaluate thresholds only; nothing is written.
    Verify,
    /// Write reports, then evaluate thresholds.
    Check,
}

impl RunMode {
    fn writes_reports(self) -> bool {
        matches!(self, RunMode::Report | RunMode::Check)
    }

    fn verifies(self) -> bool {
        matches!(self, RunMode::Verify | RunMode::Check)
    }
}

/// Exit status when a threshold rule failed. Errors use 1 to 3, see
/// [`CoverageError::exit_code`](crate::utils::error::CoverageError::exit_code).
pub const GATE_FAILED: i32 = 4;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: AggregatedReport,
    pub paths: Option<ReportPaths>,
    pub verification: Option<VerificationResult>,
}

impl RunOutcome {
    /// False only when thresholds were evaluated and one failed.
    pub fn passed(&self) -> bool {
        self.verification.as_ref().map_or(true, VerificationResult::passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            GATE_FAILED
        }
    }
}

pub struct CoverageEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> CoverageEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extraction only, for inspecting what a run would read.
    pub async fn plan(&self) -> Result<Vec<ModuleInput>> {
        let inputs = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");
        Ok(inputs)
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome> {
        tracing::info!("Starting coverage aggregation ({:?})", mode);

        let inputs = self.pipeline.extract().await?;
        tracing::info!("Extracted {} modules", inputs.len());
        self.monitor.log_stats("Extract");

        let result = self.pipeline.transform(inputs).await?;
        tracing::info!(
            "Aggregated {} units ({} used for verification)",
            result.report.unit_count(),
            result.verification_report.unit_count()
        );
        self.monitor.log_stats("Aggregate");

        let paths = if mode.writes_reports() {
            let paths = self.pipeline.load(&result).await?;
            tracing::info!("Reports written to {}", paths.xml.display());
            self.monitor.log_stats("Write");
            Some(paths)
        } else {
            None
        };

        let verification = if mode.verifies() {
            let verification = self.pipeline.verify(&result);
            for violation in verification.violations() {
                tracing::warn!("{}", violation);
            }
            Some(verification)
        } else {
            None
        };

        self.monitor.log_final_stats();

        Ok(RunOutcome {
            report: result.report,
            paths,
            verification,
        })
    }
}

/// Console block printed after the reports were written. The summary lines
/// are read back from the XML file.
pub fn report_banner(paths: &ReportPaths) -> Vec<String> {
    let rule = "=".repeat(50);
    let mut lines = vec![
        rule.clone(),
        "📊 INTEGRATED COVERAGE REPORT".to_string(),
        rule.clone(),
        format!("HTML Report: file://{}", paths.html_index.display()),
        format!("XML Report:  file://{}", paths.xml.display()),
        format!("CSV Report:  file://{}", paths.csv.display()),
    ];

    let summary = summary_block(&paths.xml);
    if !summary.is_empty() {
        lines.push(String::new());
        lines.extend(summary);
        let modules = module_summary_blocks(&paths.xml);
        if !modules.is_empty() {
            lines.push(String::new());
            lines.extend(modules);
        }
    }
    lines.push(rule);
    lines
}
