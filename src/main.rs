use anyhow::{Context, Result};
use membatch::cli::commands::{OperationsCommand, RunCommand, ValidateCommand};
use membatch::cli::output::*;
use membatch::cli::{Cli, Command};
use membatch::core::error::BatchError;
use membatch::{BatchExecutor, OperationRegistry, PipelineConfig, RunStatus, TaskEvent, TaskManager};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let registry = Arc::new(OperationRegistry::builtin()?);

    match &cli.command {
        Command::Run(cmd) => run_batch(cmd, registry).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &registry)?,
        Command::Operations(cmd) => list_operations(cmd, &registry)?,
    }

    Ok(())
}

fn load_config(path: &std::path::Path) -> PipelineConfig {
    match PipelineConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Failed to load pipeline config:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn run_batch(cmd: &RunCommand, registry: Arc<OperationRegistry>) -> Result<()> {
    let config = load_config(&cmd.config);
    let options = cmd.options(config.settings);

    println!(
        "{} Loaded pipeline: {} ({} step(s))",
        INFO,
        style(config.display_name()).bold(),
        style(config.steps.len()).cyan()
    );

    let executor = BatchExecutor::new(registry);
    let plan = match executor.plan(&config, &options) {
        Ok(plan) => plan,
        Err(BatchError::Composition(e)) => {
            print!("{}", format_violations(&e));
            std::process::exit(1);
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            std::process::exit(1);
        }
    };

    if cmd.dry_run {
        print!("{}", format_plan(&plan));
        return Ok(());
    }

    let workers = match cmd.index {
        Some(_) => 1,
        None => options.workers,
    };
    let mut manager = TaskManager::new(workers)?;

    let total = if cmd.index.is_some() { 1 } else { plan.pending_count() };
    let progress = create_progress_bar(total);
    let bar = progress.clone();
    manager.on_event(move |event| match event {
        TaskEvent::Started { name, .. } => {
            bar.set_message(format!("{} {}", name, format_run_status(&RunStatus::Running)))
        }
        TaskEvent::Finished { .. } => bar.inc(1),
        _ => {}
    });

    println!(
        "{} Processing {} input(s) with {} worker(s)",
        ROCKET,
        style(total).cyan(),
        style(workers).cyan()
    );

    let result = match cmd.index {
        Some(index) => executor.run_index(plan, index, &mut manager).await,
        None => executor.run(plan, &mut manager, workers).await,
    };
    manager.shutdown().await;
    progress.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            println!("{} {}", CROSS, style(e).red());
            std::process::exit(1);
        }
    };

    println!("{}", format_report(&report));

    if let Some(path) = &cmd.report {
        report.save(path)?;
        println!("{} Report written to {}", INFO, style(path.display()).dim());
    }

    if report.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&report.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} finished with {} failed run(s)",
            CROSS,
            style(&report.name).bold(),
            style(report.totals.failed).red()
        );
    }
    std::process::exit(report.exit_code());
}

fn validate_pipeline(cmd: &ValidateCommand, registry: &OperationRegistry) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let config = load_config(&cmd.config);

    match config.to_pipeline().validate(registry) {
        Ok(pipeline) => {
            println!("{} Pipeline is valid!", CHECK);
            println!("  Name: {}", style(pipeline.name()).bold());
            println!("  Steps: {}", style(pipeline.steps().len()).cyan());
            for step in pipeline.steps() {
                println!("    {}. {}", step.index, style(step.id()).cyan());
            }

            if cmd.json {
                println!("\n{}", config.to_json()?);
            }
            Ok(())
        }
        Err(e) => {
            print!("{}", format_violations(&e));
            if cmd.json {
                let json = serde_json::json!({ "violations": e.violations });
                println!("\n{}", serde_json::to_string_pretty(&json)?);
            }
            std::process::exit(1);
        }
    }
}

fn list_operations(cmd: &OperationsCommand, registry: &OperationRegistry) -> Result<()> {
    if cmd.json {
        let operations: Vec<_> = registry
            .iter()
            .into_iter()
            .map(|op| {
                serde_json::json!({
                    "id": op.id,
                    "description": op.description,
                    "input": op.input,
                    "output": op.output,
                    "export": op.is_export(),
                    "parameters": op.params,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&operations)?);
        return Ok(());
    }

    println!("{} Registered operations:", INFO);
    for operation in registry.iter() {
        println!("  {}", format_operation(operation));
    }
    Ok(())
}
