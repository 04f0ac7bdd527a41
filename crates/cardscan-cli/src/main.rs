// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan — locate, unwarp, and verify identity cards from photographs.
//
// Entry point. Initialises logging, builds the scanner and OCR engine, and
// writes the normalized card, its JSON summary, and an optional debug overlay.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use cardscan_core::human_errors::humanize_error;
use cardscan_core::{CardSide, ScanConfig, ScanError};
use cardscan_detect::preprocess::open_path;
use cardscan_detect::{
    CardScanner, SelectionResult, TextRecognizer, UnavailableRecognizer, render_overlay,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::{error, info, warn};

/// JPEG quality of the published card.
const JPEG_QUALITY: u8 = 95;
/// Outline width of the debug overlay, in source pixels.
const OVERLAY_THICKNESS: u32 = 3;

#[derive(Parser)]
#[command(name = "cardscan")]
#[command(about = "Locate an ID card in a photo, unwarp it, and read its identifier")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one side of a card.
    Scan {
        /// Photo of the card.
        image: PathBuf,

        /// Which side the photo shows (names the output files).
        #[arg(long, value_enum, default_value_t = SideArg::Front)]
        side: SideArg,

        #[command(flatten)]
        opts: ScanArgs,
    },

    /// Scan the front and back of a card in parallel.
    Pair {
        /// Photo of the front.
        front: PathBuf,

        /// Photo of the back.
        back: PathBuf,

        #[command(flatten)]
        opts: ScanArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SideArg {
    Front,
    Back,
}

impl From<SideArg> for CardSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Front => CardSide::Front,
            SideArg::Back => CardSide::Back,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Directory for `<side>.jpg`, `<side>.json`, and overlays.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// JSON scan configuration; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    #[arg(long)]
    models: Option<PathBuf>,

    /// Also write `<side>-overlay.png` with the detected outline.
    #[arg(long)]
    overlay: bool,

    /// Override the per-call OCR deadline in milliseconds.
    #[arg(long)]
    ocr_timeout_ms: Option<u64>,

    /// Override how many of the largest contours are considered.
    #[arg(long)]
    max_candidates: Option<usize>,
}

impl ScanArgs {
    fn scan_config(&self) -> Result<ScanConfig, ScanError> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)?,
            None => ScanConfig::default(),
        };
        if let Some(ms) = self.ocr_timeout_ms {
            config.ocr_timeout_ms = Some(ms);
        }
        if let Some(max) = self.max_candidates {
            config.max_candidates = max;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Scan failed");
            eprintln!("{}", humanize_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ScanError> {
    match cli.command {
        Commands::Scan { image, side, opts } => {
            let scanner = build_scanner(&opts)?;
            scan_side(&scanner, &image, side.into(), &opts)
        }
        Commands::Pair { front, back, opts } => {
            let scanner = build_scanner(&opts)?;
            let (front_result, back_result) = std::thread::scope(|s| {
                let front_job = s.spawn(|| scan_side(&scanner, &front, CardSide::Front, &opts));
                let back_job = s.spawn(|| scan_side(&scanner, &back, CardSide::Back, &opts));
                (join_side(front_job), join_side(back_job))
            });

            if let (Err(_), Err(back_err)) = (&front_result, &back_result) {
                eprintln!("back: {}", humanize_error(back_err));
            }
            front_result.and(back_result)
        }
    }
}

/// Join a scan worker, re-raising its panic on this thread.
fn join_side(
    handle: std::thread::ScopedJoinHandle<'_, Result<(), ScanError>>,
) -> Result<(), ScanError> {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn build_scanner(opts: &ScanArgs) -> Result<CardScanner, ScanError> {
    let config = opts.scan_config()?;
    CardScanner::new(config, build_recognizer(opts.models.as_deref()))
}

#[cfg(feature = "ocr")]
fn build_recognizer(models: Option<&Path>) -> Arc<dyn TextRecognizer> {
    use cardscan_detect::{OcrModelConfig, OcrsRecognizer};

    let config = models.map(OcrModelConfig::from_dir).unwrap_or_default();
    match OcrsRecognizer::new(&config) {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            warn!(error = %err, "OCR engine unavailable; cards will not be verified");
            Arc::new(UnavailableRecognizer::new(err.to_string()))
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn build_recognizer(models: Option<&Path>) -> Arc<dyn TextRecognizer> {
    if models.is_some() {
        warn!("built without the `ocr` feature; --models is ignored");
    }
    Arc::new(UnavailableRecognizer::new("built without the `ocr` feature"))
}

fn scan_side(
    scanner: &CardScanner,
    image: &Path,
    side: CardSide,
    opts: &ScanArgs,
) -> Result<(), ScanError> {
    let raw = open_path(image)?;
    let result = scanner.scan_image(&raw)?;
    let written = write_outputs(&result, &raw, side, opts)?;

    info!(%side, verdict = ?result.verdict, out = %written.display(), "Card written");
    println!(
        "{side}: {:?}, identifier {:?} (confidence {:.2}) -> {}",
        result.verdict,
        result.identifier.as_str(),
        result.confidence,
        written.display()
    );
    Ok(())
}

/// Write `<side>.jpg`, `<side>.json`, and optionally `<side>-overlay.png`.
/// Returns the path of the card image.
fn write_outputs(
    result: &SelectionResult,
    source: &RgbImage,
    side: CardSide,
    opts: &ScanArgs,
) -> Result<PathBuf, ScanError> {
    std::fs::create_dir_all(&opts.out_dir)?;

    let card_path = opts.out_dir.join(format!("{side}.jpg"));
    let mut writer = BufWriter::new(File::create(&card_path)?);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    result
        .card
        .write_with_encoder(encoder)
        .map_err(|err| ScanError::Encode(format!("{}: {}", card_path.display(), err)))?;
    writer.flush()?;

    let summary_path = opts.out_dir.join(format!("{side}.json"));
    let mut summary_writer = BufWriter::new(File::create(&summary_path)?);
    serde_json::to_writer_pretty(&mut summary_writer, &result.summary())?;
    summary_writer.flush()?;

    if opts.overlay {
        let overlay_path = opts.out_dir.join(format!("{side}-overlay.png"));
        render_overlay(source, &result.quad, OVERLAY_THICKNESS)
            .save(&overlay_path)
            .map_err(|err| ScanError::Encode(format!("{}: {}", overlay_path.display(), err)))?;
    }

    Ok(card_path)
}
