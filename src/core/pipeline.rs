use crate::core::aggregate::aggregate;
use crate::core::exec_data::{load_module_traces, merge_traces};
use crate::core::filter::{check_ownership, UnitFilter};
use crate::core::gate;
use crate::core::units::discover_units;
use crate::core::writer::write_reports;
use crate::domain::model::{Module, VerificationResult};
use crate::domain::ports::{ConfigProvider, ModuleInput, Pipeline, ReportPaths, Storage, TransformResult};
use crate::utils::error::{CoverageError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Loader, filter, aggregator and writer over the modules of one
/// configuration.
pub struct CoveragePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> CoveragePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }
}

fn extract_module(module: Module) -> Result<ModuleInput> {
    let (traces, exec_files) = load_module_traces(&module)?;
    let units = discover_units(&module)?;
    tracing::info!(
        "Module {}: {} execution files, {} traced units, {} compiled units",
        module.name,
        exec_files.len(),
        traces.len(),
        units.len()
    );
    Ok(ModuleInput {
        module,
        traces,
        exec_files,
        units,
    })
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CoveragePipeline<S, C> {
    async fn extract(&self) -> Result<Vec<ModuleInput>> {
        let limit = self.config.concurrent_modules().max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        tracing::debug!(
            "Extracting {} modules, {} at a time",
            self.config.modules().len(),
            limit
        );

        for module in self.config.modules().iter().cloned() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CoverageError::ProcessingError {
                    message: format!("extraction scheduler closed: {}", e),
                })?;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                extract_module(module)
            });
        }

        let mut inputs = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let input = joined.map_err(|e| CoverageError::ProcessingError {
                message: format!("module extraction task failed: {}", e),
            })??;
            inputs.push(input);
        }

        inputs.sort_by(|a, b| a.module.name.cmp(&b.module.name));
        Ok(inputs)
    }

    async fn transform(&self, inputs: Vec<ModuleInput>) -> Result<TransformResult> {
        let modules: Vec<Module> = inputs.iter().map(|i| i.module.clone()).collect();
        let units: Vec<_> = inputs.iter().flat_map(|i| i.units.iter()).collect();

        check_ownership(units.iter().copied(), &modules)?;
        let traces = merge_traces(inputs.iter().map(|i| i.traces.clone()))?;

        let report_filter = UnitFilter::new(self.config.report_includes(), self.config.report_excludes());
        let verification_filter = UnitFilter::new(
            self.config.verification_includes(),
            self.config.verification_excludes(),
        );

        let reported = report_filter.apply(units.iter().copied());
        let verified = verification_filter.apply(units.iter().copied());
        tracing::info!(
            "{} of {} compiled units reported, {} verified",
            reported.len(),
            units.len(),
            verified.len()
        );

        let name = self.config.bundle_name();
        Ok(TransformResult {
            report: aggregate(name, &modules, reported, &traces),
            verification_report: aggregate(name, &modules, verified, &traces),
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<ReportPaths> {
        write_reports(&self.storage, &result.report).await
    }

    fn verify(&self, result: &TransformResult) -> VerificationResult {
        gate::verify(
            &result.verification_report,
            self.config.rules(),
            self.config.verify_per_module(),
        )
    }
}
