use crate::domain::model::{
    AggregatedReport, CompiledUnit, Module, ThresholdRule, TraceSet, VerificationResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location a relative report path ends up at, for display.
    fn resolve(&self, path: &str) -> PathBuf;
}

pub trait ConfigProvider: Send + Sync {
    fn bundle_name(&self) -> &str;
    fn modules(&self) -> &[Module];
    fn output_dir(&self) -> &Path;
    fn report_includes(&self) -> &[String];
    fn report_excludes(&self) -> &[String];
    fn verification_includes(&self) -> &[String];
    fn verification_excludes(&self) -> &[String];
    fn rules(&self) -> &[ThresholdRule];
    /// Also apply the rules to every module on its own.
    fn verify_per_module(&self) -> bool {
        false
    }
    fn concurrent_modules(&self) -> usize;
}

/// Everything extracted for one module: its merged traces and the compiled
/// units found under its class roots.
#[derive(Debug, Clone)]
pub struct ModuleInput {
    pub module: Module,
    pub traces: TraceSet,
    pub exec_files: Vec<PathBuf>,
    pub units: Vec<CompiledUnit>,
}

/// Aggregates built from one extraction, one per exclusion rule set.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub report: AggregatedReport,
    pub verification_report: AggregatedReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub xml: PathBuf,
    pub html_index: PathBuf,
    pub csv: PathBuf,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<ModuleInput>>;
    async fn transform(&self, inputs: Vec<ModuleInput>) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<ReportPaths>;
    /// Threshold check over the verification aggregate. Pure.
    fn verify(&self, result: &TransformResult) -> VerificationResult;
}
