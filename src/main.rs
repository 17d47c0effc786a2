use anyhow::Context;
use clap::Parser;
use coverage_rollup::core::engine::report_banner;
use coverage_rollup::core::summary::print_summary;
use coverage_rollup::domain::ports::{ConfigProvider, ModuleInput};
use coverage_rollup::utils::error::CoverageError;
use coverage_rollup::utils::{logger, validation::Validate};
use coverage_rollup::{
    Cli, Command, CoverageConfig, CoverageEngine, CoveragePipeline, LocalStorage,
};

fn report_error(e: &CoverageError) -> i32 {
    if !e.is_fatal() {
        tracing::warn!("⚠️ {} ({:?})", e, e.category());
        return e.exit_code();
    }

    tracing::error!(
        "❌ Coverage run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    e.exit_code()
}

fn print_plan(config: &CoverageConfig, inputs: &[ModuleInput]) {
    println!("Bundle:      {}", config.bundle_name());
    println!("Output:      {}", config.output_dir().display());
    println!("Excludes:    {}", config.report_excludes().join(", "));
    println!("Verify excl: {}", config.verification_excludes().join(", "));
    println!("Per module:  {}", config.verify_per_module());
    for rule in config.rules() {
        println!("Rule:        {} >= {:.2}", rule.counter, rule.minimum);
    }
    for input in inputs {
        println!();
        println!("Module {} ({})", input.module.name, input.module.root.display());
        for root in &input.module.class_roots {
            println!("  classes:   {}", root.display());
        }
        println!("  units:     {}", input.units.len());
        println!("  exec data: {} files, {} traced units", input.exec_files.len(), input.traces.len());
    }
}

async fn run(cli: &Cli) -> Result<i32, CoverageError> {
    if let Command::Summary { .. } = cli.command {
        print_summary(&cli.summary_path()?);
        return Ok(0);
    }

    let config = cli.resolve_config()?;
    tracing::debug!("Resolved configuration: {:?}", config);

    let storage = LocalStorage::new(config.output_dir.clone());
    let pipeline = CoveragePipeline::new(storage, config);
    let engine = CoverageEngine::new_with_monitoring(pipeline, cli.monitor);

    let Some(mode) = cli.command.run_mode() else {
        let inputs = engine.plan().await?;
        print_plan(engine.pipeline().config(), &inputs);
        return Ok(0);
    };

    let outcome = engine.run(mode).await?;

    if let Some(paths) = &outcome.paths {
        for line in report_banner(paths) {
            println!("{}", line);
        }
    }

    match &outcome.verification {
        Some(verification) if !verification.passed() => {
            for violation in verification.violations() {
                eprintln!("❌ {}", violation);
            }
            Ok(outcome.exit_code())
        }
        Some(_) => {
            println!("✅ Coverage thresholds met for bundle {}", outcome.report.name);
            Ok(0)
        }
        None => Ok(0),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting coverage-rollup");
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };

    if code > 0 {
        std::process::exit(code);
    }

    std::io::Write::flush(&mut std::io::stdout()).context("flushing stdout")?;
    Ok(())
}
