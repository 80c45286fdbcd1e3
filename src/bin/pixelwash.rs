//! CLI binary for pixelwash.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to a `ConverterConfig`, runs one phase, and exits with its status.
//! Stdout carries only the JSON-lines progress protocol; logs go to stderr.

use anyhow::{anyhow, Result};
use clap::Parser;
use pixelwash::{
    parse_switch, CleanupPolicy, ConvertError, Converter, ConverterConfig, JsonLinesReporter,
    OcrSetting, Phase, ProgressTracker,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"PROTOCOL:
  Every step is reported on stdout as one JSON object per line:
    {"error":false,"text":"Converting page 1/3 to pixels","percentage":5}
  A failed run ends with exactly one event where "error" is true.

EXIT STATUS:
  0  the phase completed
  1  the phase failed (see the last progress event)
  2  invalid command line

EXAMPLES:
  # Phase 1, inside the document sandbox
  pixelwash document-to-pixels

  # Phase 2 with a searchable text layer
  OCR=1 OCR_LANGUAGE=eng pixelwash pixels-to-pdf

  # Everything under one scratch directory
  pixelwash document-to-pixels --input-file ./suspicious.docx \
      --work-dir ./work --pixels-dir ./pixels --safe-dir ./safe
"#;

/// Flatten untrusted documents to pixels and rebuild them as safe PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pixelwash",
    version,
    about = "Flatten untrusted documents to pixels and rebuild them as safe PDFs",
    long_about = "Runs one phase of a two-phase document sanitiser. `document-to-pixels` renders \
the untrusted input to raw RGB page buffers in the handoff area; `pixels-to-pdf` rebuilds a PDF \
from those buffers alone, optionally adding an OCR text layer.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Which phase to run.
    #[arg(value_enum)]
    mode: Mode,

    /// Add a searchable text layer in phase 2 (`--ocr`, or `--ocr=1/0`, `true/false`, `yes/no`, `on/off`).
    #[arg(
        long,
        env = "OCR",
        value_parser = parse_switch,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "1",
        default_value = "0"
    )]
    ocr: bool,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    #[arg(long, env = "OCR_LANGUAGE")]
    ocr_language: Option<String>,

    /// The untrusted source document. Default: /tmp/input_file.
    #[arg(long, env = "PIXELWASH_INPUT_FILE")]
    input_file: Option<PathBuf>,

    /// Scratch directory for intermediate files. Default: /tmp.
    #[arg(long, env = "PIXELWASH_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Handoff directory for pixel buffers. Default: /dangerzone.
    #[arg(long, env = "PIXELWASH_PIXELS_DIR")]
    pixels_dir: Option<PathBuf>,

    /// Output directory for the safe PDFs. Default: /safezone.
    #[arg(long, env = "PIXELWASH_SAFE_DIR")]
    safe_dir: Option<PathBuf>,

    /// Delete intermediate artifacts when the phase fails.
    #[arg(long, env = "PIXELWASH_PURGE_ON_FAILURE")]
    purge_on_failure: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PIXELWASH_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, env = "PIXELWASH_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Mode {
    DocumentToPixels,
    PixelsToPdf,
}

impl From<Mode> for Phase {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::DocumentToPixels => Phase::DocumentToPixels,
            Mode::PixelsToPdf => Phase::PixelsToPdf,
        }
    }
}

impl Cli {
    /// Text recognition only happens while rebuilding the PDF, so the OCR
    /// switch is neither read nor validated for `document-to-pixels`.
    fn config(&self, phase: Phase) -> std::result::Result<ConverterConfig, ConvertError> {
        let ocr = match phase {
            Phase::DocumentToPixels => OcrSetting::Disabled,
            Phase::PixelsToPdf => OcrSetting::from_parts(self.ocr, self.ocr_language.as_deref())?,
        };
        let mut builder = ConverterConfig::builder().ocr(ocr);
        if let Some(ref path) = self.input_file {
            builder = builder.input_file(path);
        }
        if let Some(ref path) = self.work_dir {
            builder = builder.work_dir(path);
        }
        if let Some(ref path) = self.pixels_dir {
            builder = builder.pixels_dir(path);
        }
        if let Some(ref path) = self.safe_dir {
            builder = builder.safe_dir(path);
        }
        if self.purge_on_failure {
            builder = builder.cleanup(CleanupPolicy::Purge);
        }
        builder.build()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout belongs to the progress protocol.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("could not install logger: {e}"))?;

    let phase = Phase::from(cli.mode);

    // ── Configuration ────────────────────────────────────────────────────
    // A rejected configuration is still a phase failure as far as the host
    // is concerned: one error event, exit status 1.
    let config = match cli.config(phase) {
        Ok(config) => config,
        Err(e) => {
            let reporter = Arc::new(JsonLinesReporter::stdout());
            let mut progress = ProgressTracker::new(reporter, phase.start_percentage());
            progress.fail(e.to_string());
            std::process::exit(1);
        }
    };
    debug!("Configuration: {:?}", config);

    // ── Run ──────────────────────────────────────────────────────────────
    let outcome = Converter::with_system_tools(config).run(phase).await;
    std::process::exit(outcome.exit_code());
}
