use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use spritebake::batch::{enqueue_batch, expand_manifest, write_job_log};
use spritebake::cli::{BatchArgs, CliArgs, Command, CompressionLevel, CurateArgs, SheetArgs};
use spritebake::config::{self, CompressConfig, SheetConfig};
use spritebake::dataset::curate_dataset;
use spritebake::output::save_sheet_image;
use spritebake::render::{HttpRenderClient, LoraWeights};
use spritebake::sheet::{SheetPlan, bake_sheet};

#[allow(clippy::print_stderr)]
fn main() {
    if let Err(e) = run() {
        // Use eprintln instead of error! because logger may not be initialized
        // (e.g., config loading fails before logger init)
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let verbose = match &cli.command {
        Command::Sheet(args) => args.verbose,
        Command::Batch(args) => args.verbose,
        Command::Curate(args) => args.verbose,
    };

    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    info!("spritebake v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Sheet(args) => run_sheet(args),
        Command::Batch(args) => run_batch(args),
        Command::Curate(args) => run_curate(args),
    }
}

fn run_sheet(args: SheetArgs) -> Result<()> {
    let loaded = config::load_sheet_config(&args.config)?;
    let mut cfg = loaded.value.clone();
    apply_sheet_overrides(&mut cfg, &args);

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| loaded.resolve(&cfg.output_dir));
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    }

    let plan = SheetPlan::from_config(&cfg);
    info!(
        "Baking {}x{} sheet ({} frames per facing) via {}",
        plan.layout.canvas_width(),
        plan.layout.canvas_height(),
        plan.layout.frames_per_facing,
        cfg.server_url
    );

    let client = HttpRenderClient::new(cfg.server_url.clone());
    let (sheet, report) = bake_sheet(&client, &plan)?;

    let compress = args.compress.or_else(|| compress_from_config(&cfg));
    let path = output_dir.join(format!("{}.png", cfg.name));
    save_sheet_image(&sheet, &path, compress)?;
    info!("Saved {} ({}x{})", path.display(), sheet.width(), sheet.height());

    if !report.blank_cells.is_empty() {
        warn!(
            "{} cell(s) came back blank: {}",
            report.blank_cells.len(),
            report.blank_cells.join(", ")
        );
    }

    Ok(())
}

/// CLI arguments always take precedence over config values.
fn apply_sheet_overrides(cfg: &mut SheetConfig, args: &SheetArgs) {
    if let Some(server) = &args.server {
        cfg.server_url = server.clone();
    }
    if let Some(name) = &args.name {
        cfg.name = name.clone();
    }
    if let Some(seed) = args.seed {
        cfg.base_seed = seed;
    }
    if let Some(character) = &args.character {
        cfg.character_prompt = character.clone();
    }
    if let Some(cell_size) = args.cell_size {
        cfg.cell_size = cell_size;
    }
    if let Some(lora) = &args.lora {
        match &mut cfg.lora {
            Some(existing) => existing.name = lora.clone(),
            None => {
                cfg.lora = Some(LoraWeights {
                    name: lora.clone(),
                    ..LoraWeights::default()
                });
            }
        }
    }
}

fn compress_from_config(cfg: &SheetConfig) -> Option<CompressionLevel> {
    cfg.compress.as_ref().map(|c| match c {
        CompressConfig::Level(n) => CompressionLevel::Level(*n),
        CompressConfig::Max(_) => CompressionLevel::Max,
    })
}

fn run_batch(args: BatchArgs) -> Result<()> {
    let loaded = config::load_batch_manifest(&args.manifest)?;
    let mut manifest = loaded.value.clone();
    if let Some(server) = &args.server {
        manifest.server_url = server.clone();
    }

    if args.dry_run {
        let planned = expand_manifest(&manifest);
        for job in &planned {
            info!("would queue {} (seed {})", job.label, job.seed);
        }
        info!("Dry run: {} jobs, nothing submitted", planned.len());
        return Ok(());
    }

    let client = HttpRenderClient::new(manifest.server_url.clone());
    let queued = enqueue_batch(&client, &manifest)?;
    info!("Queued {} jobs on {}", queued.len(), manifest.server_url);

    let log_path = args
        .job_log
        .clone()
        .or_else(|| manifest.job_log.as_ref().map(|p| loaded.resolve(p)));
    if let Some(path) = log_path {
        write_job_log(&queued, &path)?;
        info!("Job log written to {}", path.display());
    }

    Ok(())
}

fn run_curate(args: CurateArgs) -> Result<()> {
    let loaded = config::load_curate_manifest(&args.manifest)?;
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| loaded.resolve(&loaded.value.output_dir));

    let summary = curate_dataset(&loaded.value, &loaded.dir, &output_dir)?;
    info!(
        "Curated {} images across {} characters ({} skipped) into {}",
        summary.copied,
        summary.characters,
        summary.skipped,
        output_dir.display()
    );

    Ok(())
}
