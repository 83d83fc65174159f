//! Pressure Spotter
//!
//! Command line tool that reads weather map images, detects pressure systems
//! and their position markers, and writes per-map tables plus a combined
//! track table.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use image::{GrayImage, Luma};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use pressure_spotter::config::SpotterConfig;
use pressure_spotter::mask::MaskSet;
use pressure_spotter::ocr::{ensure_tessdata, TesseractEngine};
use pressure_spotter::paths::{self, MapOutputPaths, TRACK_TABLE_NAME};
use pressure_spotter::report::{export_to_json, write_table, write_track_table, MapReport};
use pressure_spotter::{run_batch, Analyzer, MapAnalysis, MapInput};

#[derive(Parser, Debug)]
#[command(name = "pressure-spotter", version, about = "Find L/H pressure systems and X markers on weather maps")]
struct Cli {
    /// Map images, or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Config file (defaults to config.json next to the executable; created
    /// with default values when missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    out: PathBuf,

    /// Also write overlay and mask images
    #[arg(long)]
    debug: bool,

    /// Worker threads
    #[arg(short = 'j', long, default_value_t = default_workers())]
    workers: usize,

    /// Skip pressure reading
    #[arg(long)]
    no_ocr: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Installs the logger: `[HH:MM:SS.mmm] message`, `info` unless `RUST_LOG` says otherwise.
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            writeln!(buf, "[{}] {}", timestamp, record.args())
        })
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            log::warn!("{} map(s) failed", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the whole batch and returns the number of failed maps.
fn run(cli: Cli) -> Result<usize> {
    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    let mut config = SpotterConfig::load_or_create(&config_path);
    config.debug |= cli.debug;
    if cli.no_ocr {
        config.ocr.enabled = false;
    }

    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("Failed to create output directory {}", cli.out.display()))?;

    let files = paths::collect_map_files(&cli.inputs)?;
    if files.is_empty() {
        log::warn!("No map files found");
        return Ok(0);
    }

    let mut failed = 0;
    let mut inputs = Vec::with_capacity(files.len());
    for file in &files {
        match std::fs::read(file) {
            Ok(bytes) => inputs.push(MapInput::new(paths::map_name(file), bytes)),
            Err(e) => {
                log::error!("Failed to read {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    let analyzer = build_analyzer(config);
    let outcomes = run_batch(&analyzer, inputs, cli.workers);

    let mut reports: Vec<MapReport> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let analysis = match outcome.result {
            Ok(analysis) => analysis,
            Err(e) => {
                log::error!("{}", e);
                failed += 1;
                continue;
            }
        };
        let outputs = MapOutputPaths::new(&cli.out, &outcome.name);
        if let Err(e) = write_map_outputs(&analysis, &outputs) {
            log::error!("{}: {:#}", outcome.name, e);
            failed += 1;
        }
        reports.push(analysis.report);
    }

    let track_path = cli.out.join(TRACK_TABLE_NAME);
    write_track_table(&track_path, &reports)?;
    log::info!(
        "Wrote {} ({} maps, {} failed)",
        track_path.display(),
        reports.len(),
        failed
    );

    Ok(failed)
}

/// Template matching always; Tesseract only when OCR is on and can be set up.
fn build_analyzer(config: SpotterConfig) -> Analyzer {
    if !config.ocr.enabled {
        log::info!("OCR disabled");
        return Analyzer::new(config);
    }

    let engine = ensure_tessdata().and_then(|_| TesseractEngine::from_config(&config.ocr));
    match engine {
        Ok(engine) => Analyzer::new(config).with_recognizer(Box::new(engine)),
        Err(e) => {
            log::warn!("Failed to set up Tesseract: {:#}", e);
            log::warn!("Pressure values will be left empty.");
            Analyzer::new(config)
        }
    }
}

fn write_map_outputs(analysis: &MapAnalysis, outputs: &MapOutputPaths) -> Result<()> {
    write_table(&analysis.report, &outputs.table)?;
    export_to_json(&analysis.report, &outputs.json)?;

    if let Some(overlay) = &analysis.overlay {
        overlay
            .save(&outputs.overlay)
            .with_context(|| format!("Failed to save {}", outputs.overlay.display()))?;
        mask_preview(&analysis.masks)
            .save(&outputs.mask)
            .with_context(|| format!("Failed to save {}", outputs.mask.display()))?;
    }

    log::debug!("Wrote outputs to {}", outputs.table.display());
    Ok(())
}

/// Symbol pixels white, marker-only pixels gray.
fn mask_preview(masks: &MaskSet) -> GrayImage {
    let (width, height) = (masks.symbols.width(), masks.symbols.height());
    GrayImage::from_fn(width, height, |x, y| {
        if masks.symbols.is_set(x, y) {
            Luma([255])
        } else if masks.markers.is_set(x, y) {
            Luma([128])
        } else {
            Luma([0])
        }
    })
}
