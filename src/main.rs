mod artifact;
mod automation;
mod cli;
mod collaborators;
mod core;
mod orchestrator;

use anyhow::{Context, Result};
use artifact::ArtifactStore;
use automation::CubismUi;
use cli::commands::{RunCommand, StatusCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use collaborators::{SdCommandGenerator, SegmenterCommand};
use crate::core::config::AppConfig;
use crate::core::run::{EntryPoint, RunId};
use orchestrator::{Orchestrator, PipelineEvent};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Status(cmd) => show_status(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let mut config = AppConfig::from_file(&cmd.config)
        .with_context(|| format!("Failed to load config from {}", cmd.config))?;

    if let Some(prompt) = &cmd.prompt {
        config.generation.prompt = prompt.clone();
        println!("{} Prompt override: {}", INFO, style(prompt).dim());
    }

    for dir in [&config.io.output_dir, &config.io.temp_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let entry = if let Some(layer_dir) = &cmd.layer_dir {
        println!(
            "{} Resuming from layer directory {}",
            INFO,
            style(layer_dir.display()).bold()
        );
        EntryPoint::SkipSegmentation(layer_dir.clone())
    } else if let Some(image) = &cmd.character_image {
        println!(
            "{} Using existing character image {}",
            INFO,
            style(image.display()).bold()
        );
        EntryPoint::SkipGeneration(image.clone())
    } else {
        EntryPoint::FullGeneration
    };

    let generator = SdCommandGenerator::new(config.generation.clone());
    let segmenter = SegmenterCommand::new(config.segmentation.clone());
    let cubism = config.cubism.clone();
    let automation = config.automation.clone();
    let driver_factory = move || CubismUi::new(cubism.clone(), automation.clone());

    let orchestrator = Orchestrator::new(config, generator, segmenter, driver_factory);

    // Stage progress bar; events print above it
    let total = entry.required_stages().len() + entry.skipped_stages().len();
    let progress = create_progress_bar(total);
    let pb = progress.clone();
    orchestrator.add_event_handler(move |event| {
        pb.println(format_pipeline_event(&event));
        match &event {
            PipelineEvent::StageStarted { stage } => pb.set_message(stage.to_string()),
            PipelineEvent::StageSkipped { .. }
            | PipelineEvent::StageCompleted { .. }
            | PipelineEvent::StageFailed { .. } => pb.inc(1),
            _ => {}
        }
    });

    println!();
    let result = orchestrator.execute(entry).await;
    progress.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            println!("{} {}", CROSS, style(&e).red());
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!();
    for record in &result.records {
        println!("  {}", format_stage_record(record));
    }

    if result.succeeded() {
        println!(
            "\n{} Run {} completed {}",
            CHECK,
            style(result.run_id.as_str()).bold(),
            style("successfully").green()
        );
        if let Some(export) = &result.export_path {
            println!("{} Model exported to {}", INFO, style(export.display()).bold());
        }
        Ok(())
    } else {
        if let Some(failing) = result.failing_stage() {
            println!(
                "\n{} Run {} {} at {}",
                CROSS,
                style(result.run_id.as_str()).bold(),
                style("failed").red(),
                style(failing.stage.as_str()).bold()
            );
        }

        let imported = result.imported_layers();
        if !imported.is_empty() {
            println!(
                "{} Layers imported before failure: {}",
                INFO,
                style(imported.join(", ")).cyan()
            );
            println!(
                "{} Imported layers remain in the run directory for manual completion",
                INFO
            );
        }

        std::process::exit(1);
    }
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    match AppConfig::from_file(&cmd.config) {
        Ok(config) => {
            println!("{} Configuration is valid!", CHECK);
            println!(
                "  Cubism: {}",
                style(config.cubism.executable_path.display()).bold()
            );
            println!(
                "  Output: {}",
                style(config.io.output_dir.display()).cyan()
            );
            println!(
                "  Import retries: {}",
                style(config.automation.import_retries).cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn show_status(cmd: &StatusCommand) -> Result<()> {
    let config = AppConfig::from_file(&cmd.config)
        .with_context(|| format!("Failed to load config from {}", cmd.config))?;
    let store = ArtifactStore::new(config.io.output_dir);

    // A specific run: print its full stage history
    if let Some(id) = &cmd.run_id {
        let id = RunId::parse(id)?;
        let run = store.load_run(&id)?;

        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
            return Ok(());
        }

        println!("{}", format_run_summary(&run));
        println!("  Entry: {:?}", run.entry);
        println!("  Root: {}", style(run.root.display()).dim());
        for record in run.stage_records() {
            println!("  {}", format_stage_record(&record));
        }
        return Ok(());
    }

    // Otherwise list the most recent runs
    let ids = store.list_runs()?;
    if ids.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    let runs: Vec<_> = ids
        .iter()
        .take(cmd.limit)
        .filter_map(|id| store.load_run(id).ok())
        .collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for run in &runs {
        println!("  {}", format_run_summary(run));
    }

    Ok(())
}
