//! Error types for the pixelwash library.
//!
//! Every failure is terminal for the phase in which it occurs: nothing is
//! retried and nothing is recovered locally. [`ConvertError`] therefore has
//! no "page-level" sibling; a single bad page aborts the whole document and
//! surfaces as exactly one failure progress event.
//!
//! The `Display` text of each variant *is* the human-readable message sent to
//! the host in that failure event, so it is written for an end user rather
//! than for a developer reading logs.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::runner::Tool;

/// All fatal errors returned by the pixelwash library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The sniffed content type has no conversion plan.
    #[error("The document format is not supported ({mime_type})")]
    UnsupportedFormat { mime_type: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// An external tool ran past its time limit and was killed.
    #[error("Error {step}, {tool} timed out after {limit_secs} seconds")]
    ToolTimeout {
        step: Step,
        tool: Tool,
        limit_secs: u64,
    },

    /// An external tool exited unsuccessfully or could not be started.
    #[error("Error {step}, {tool} {status}")]
    ToolFailure {
        step: Step,
        tool: Tool,
        status: ExitStatusReport,
    },

    // ── Staging errors ────────────────────────────────────────────────────
    /// A staged artifact is missing, malformed, or could not be moved.
    #[error("File error at '{path}': {detail}")]
    Filesystem { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Configuration was rejected before any tool ran.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    /// Shorthand for a [`ConvertError::Filesystem`] built from an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            detail: source.to_string(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// How an unsuccessful tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatusReport {
    /// The process exited with a nonzero code.
    Code(i32),
    /// The process was terminated by a signal (no exit code).
    Signal,
    /// The process could not be spawned at all.
    NotStarted(String),
}

impl fmt::Display for ExitStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "failed with exit code {code}"),
            Self::Signal => f.write_str("was terminated by a signal"),
            Self::NotStarted(reason) => write!(f, "could not be started: {reason}"),
        }
    }
}

/// The activity an external tool was performing when it failed.
///
/// Rendered in lowercase so it reads naturally after "Error …".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ConvertToPdf,
    SplitPages,
    PageToPng { page: usize, total: usize },
    PngToPixels { page: usize, total: usize },
    PixelsToPng { page: usize, total: usize },
    Ocr { page: usize, total: usize },
    PixelsToPdf { page: usize, total: usize },
    MergePages,
    Compress,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Step::ConvertToPdf => f.write_str("converting document to PDF"),
            Step::SplitPages => f.write_str("separating document into pages"),
            Step::PageToPng { page, total } => {
                write!(f, "converting page {page}/{total} from PDF to PNG")
            }
            Step::PngToPixels { page, total } => {
                write!(f, "converting page {page}/{total} from PNG to pixels")
            }
            Step::PixelsToPng { page, total } => {
                write!(f, "converting page {page}/{total} from pixels to PNG")
            }
            Step::Ocr { page, total } => {
                write!(f, "converting page {page}/{total} to searchable PDF")
            }
            Step::PixelsToPdf { page, total } => {
                write!(f, "converting page {page}/{total} from pixels to PDF")
            }
            Step::MergePages => f.write_str("merging pages into a single PDF"),
            Step::Compress => f.write_str("compressing PDF"),
        }
    }
}
