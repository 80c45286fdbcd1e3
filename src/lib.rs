//! # pixelwash
//!
//! Sanitise untrusted documents by flattening them to pixels and rebuilding
//! a clean PDF from those pixels alone.
//!
//! ## Why two phases?
//!
//! Anything active in a document (scripts, macros, embedded objects, exotic
//! font programs) lives in its structure, not in what it looks like on the
//! page. Phase 1 runs against the untrusted input and emits nothing but raw
//! RGB buffers and their dimensions. Phase 2 runs in a separate, cleaner
//! environment and never sees the original file. The only thing crossing
//! the boundary is pixels.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input document
//!  │
//!  ├─ 1. Classify   sniff the real MIME type from content
//!  ├─ 2. Plan       passthrough / LibreOffice / GraphicsMagick, or reject
//!  ├─ 3. To PDF     render the intermediate PDF
//!  ├─ 4. Paginate   pdftk burst into page-N.pdf
//!  ├─ 5. Rasterise  page-N.pdf → PNG → page-N.rgb (+ width, height)
//!  │                ─── handoff area ───
//!  ├─ 6. Rebuild    page-N.rgb → page-N.pdf (optionally OCR'd)
//!  └─ 7. Assemble   pdfunite + ps2pdf → safe output area
//! ```
//!
//! Progress goes to the host as JSON lines, 0→50 for phase 1 and 50→100 for
//! phase 2. Every external tool call has a timeout, and the first failure ends
//! the run with a single error event.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pixelwash::{Converter, ConverterConfig, OcrSetting, Phase};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder()
//!         .ocr(OcrSetting::enabled("eng"))
//!         .build()?;
//!     let outcome = Converter::with_system_tools(config)
//!         .run(Phase::DocumentToPixels)
//!         .await;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pixelwash` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External Tools
//!
//! `libreoffice`, `gm`, `pdftk`, `pdftocairo`, `tesseract`, `pdfunite` and
//! `ps2pdf` must be on `PATH`, or overridden with
//! [`ProcessRunner::with_program`]. Tests substitute their own [`ToolRunner`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod runner;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    parse_switch, CleanupPolicy, ConverterConfig, ConverterConfigBuilder, OcrSetting,
    SandboxPaths, Timeouts,
};
pub use convert::Converter;
pub use error::{ConvertError, ExitStatusReport, Step};
pub use output::{Phase, PipelineOutcome};
pub use pipeline::plan::{ConversionPlan, OfficeFilter, SupportedFormat};
pub use progress::{
    JsonLinesReporter, NoopReporter, ProgressEvent, ProgressReporter, ProgressTracker, Reporter,
};
pub use runner::{ProcessRunner, Tool, ToolInvocation, ToolOutcome, ToolOutput, ToolRunner};
