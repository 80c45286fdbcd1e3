//! Result types returned by the phase entry points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The two independently invoked halves of a sanitisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Untrusted document → per-page raw pixel buffers.
    DocumentToPixels,
    /// Pixel buffers → safe PDF.
    PixelsToPdf,
}

impl Phase {
    /// Percentage at which the phase begins.
    pub fn start_percentage(self) -> f64 {
        match self {
            Phase::DocumentToPixels => 0.0,
            Phase::PixelsToPdf => 50.0,
        }
    }

    /// The command-line name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::DocumentToPixels => "document-to-pixels",
            Phase::PixelsToPdf => "pixels-to-pdf",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one phase invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub phase: Phase,
    pub success: bool,
    /// Last percentage reported to the host.
    pub percentage: u8,
    /// Text of the last event (the error message on failure).
    pub message: String,
    /// Number of pages processed, when known.
    pub pages: Option<usize>,
    /// Files published to the output area: the merged and the compressed
    /// PDF after a successful phase 2, empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PathBuf>,
}

impl PipelineOutcome {
    /// Process exit status for this outcome: 0 on success, 1 on any handled failure.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}
