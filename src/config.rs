//! Configuration types for document sanitisation.
//!
//! All pipeline behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`]. Externally supplied values (the OCR
//! switch and language in particular) are validated once here, at the
//! pipeline boundary, so no unchecked value ever reaches a tool's argv.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one sanitisation run.
///
/// # Example
/// ```rust
/// use pixelwash::{ConverterConfig, OcrSetting};
///
/// let config = ConverterConfig::builder()
///     .work_dir("/tmp")
///     .ocr(OcrSetting::enabled("eng"))
///     .build()
///     .unwrap();
/// assert!(config.ocr.is_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Where the input document and every staging area live.
    pub paths: SandboxPaths,

    /// Whether phase 2 overlays a recognised text layer. Default: disabled.
    pub ocr: OcrSetting,

    /// Resolution hint handed to the text-recognition tool. Default: 70.
    pub ocr_dpi: u32,

    /// Per-invocation time limits.
    pub timeouts: Timeouts,

    /// What to do with working-area artifacts after a failed run. Default: retain.
    pub cleanup: CleanupPolicy,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            paths: SandboxPaths::default(),
            ocr: OcrSetting::Disabled,
            ocr_dpi: 70,
            timeouts: Timeouts::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every invariant the pipeline relies on.
    ///
    /// Called by the builder and again at each phase entry, since the
    /// fields are public and may have been edited after `build()`.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if let OcrSetting::Enabled { language } = &self.ocr {
            validate_language(language)?;
        }
        if self.ocr_dpi == 0 {
            return Err(ConvertError::InvalidConfig("OCR DPI must be ≥ 1".into()));
        }
        self.timeouts.validate()?;
        for (name, dir) in [
            ("work", &self.paths.work_dir),
            ("pixels", &self.paths.pixels_dir),
            ("safe", &self.paths.safe_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ConvertError::InvalidConfig(format!(
                    "{name} directory must not be empty"
                )));
            }
        }
        if self.paths.work_dir == self.paths.pixels_dir {
            return Err(ConvertError::InvalidConfig(
                "work and pixels directories must differ".into(),
            ));
        }
        if self.paths.input_file.file_name().is_none() {
            return Err(ConvertError::InvalidConfig(format!(
                "input path {:?} does not name a file",
                self.paths.input_file
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn paths(mut self, paths: SandboxPaths) -> Self {
        self.config.paths = paths;
        self
    }

    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.input_file = path.into();
        self
    }

    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.work_dir = path.into();
        self
    }

    pub fn pixels_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.pixels_dir = path.into();
        self
    }

    pub fn safe_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.safe_dir = path.into();
        self
    }

    pub fn ocr(mut self, ocr: OcrSetting) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.config.cleanup = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Filesystem locations shared with the sandbox host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPaths {
    /// The untrusted source document. Default: `/tmp/input_file`.
    pub input_file: PathBuf,
    /// Scratch area for intermediate PDFs and images. Default: `/tmp`.
    pub work_dir: PathBuf,
    /// Handoff area: phase 1 writes pixel buffers here, phase 2 reads them. Default: `/dangerzone`.
    pub pixels_dir: PathBuf,
    /// Final output area for the rebuilt PDFs. Default: `/safezone`.
    pub safe_dir: PathBuf,
}

impl Default for SandboxPaths {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("/tmp/input_file"),
            work_dir: PathBuf::from("/tmp"),
            pixels_dir: PathBuf::from("/dangerzone"),
            safe_dir: PathBuf::from("/safezone"),
        }
    }
}

impl SandboxPaths {
    /// Put every area under `root`, as `root/{input_file,work,pixels,safe}`.
    pub fn under(root: &Path) -> Self {
        Self {
            input_file: root.join("input_file"),
            work_dir: root.join("work"),
            pixels_dir: root.join("pixels"),
            safe_dir: root.join("safe"),
        }
    }

    /// Merged (uncompressed) output in the working area.
    pub fn merged_pdf(&self) -> PathBuf {
        self.work_dir.join(MERGED_PDF_NAME)
    }

    /// Compressed output in the working area.
    pub fn compressed_pdf(&self) -> PathBuf {
        self.work_dir.join(COMPRESSED_PDF_NAME)
    }
}

pub const MERGED_PDF_NAME: &str = "safe-output.pdf";
pub const COMPRESSED_PDF_NAME: &str = "safe-output-compressed.pdf";

/// Text-recognition switch for phase 2.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrSetting {
    #[default]
    Disabled,
    Enabled {
        /// Tesseract language identifier, e.g. `eng` or `eng+fra`.
        language: String,
    },
}

impl OcrSetting {
    pub fn enabled(language: impl Into<String>) -> Self {
        OcrSetting::Enabled {
            language: language.into(),
        }
    }

    /// Combine the raw switch and language as the host supplies them.
    ///
    /// Enabled without a language is rejected here rather than passed on to
    /// the recognition tool. A language given while disabled is ignored.
    pub fn from_parts(enabled: bool, language: Option<&str>) -> Result<Self, ConvertError> {
        if !enabled {
            return Ok(OcrSetting::Disabled);
        }
        match language.map(str::trim) {
            Some(lang) => {
                validate_language(lang)?;
                Ok(OcrSetting::enabled(lang))
            }
            None => Err(ConvertError::InvalidConfig(
                "text recognition is enabled but no OCR language was given".into(),
            )),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, OcrSetting::Enabled { .. })
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            OcrSetting::Enabled { language } => Some(language),
            OcrSetting::Disabled => None,
        }
    }
}

/// Parse a boolean-like switch value (`1`, `true`, `yes`, `on` and their negatives).
pub fn parse_switch(value: &str) -> Result<bool, ConvertError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConvertError::InvalidConfig(format!(
            "expected a boolean switch, got {other:?}"
        ))),
    }
}

fn validate_language(language: &str) -> Result<(), ConvertError> {
    if language.is_empty() {
        return Err(ConvertError::InvalidConfig(
            "OCR language must not be empty".into(),
        ));
    }
    if let Some(bad) = language
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')))
    {
        return Err(ConvertError::InvalidConfig(format!(
            "OCR language {language:?} contains invalid character {bad:?}"
        )));
    }
    if language.split('+').any(str::is_empty) {
        return Err(ConvertError::InvalidConfig(format!(
            "OCR language {language:?} has an empty component"
        )));
    }
    Ok(())
}

/// Time limits for external tools, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Every phase-1 tool (render, split, rasterise). Default: 60.
    pub render_secs: u64,
    /// Every phase-2 per-page tool and the merge. Default: 120.
    pub reconstruct_secs: u64,
    /// Compression budget per page. Default: 3.
    pub compress_secs_per_page: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            render_secs: 60,
            reconstruct_secs: 120,
            compress_secs_per_page: 3,
        }
    }
}

impl Timeouts {
    pub fn render(&self) -> Duration {
        Duration::from_secs(self.render_secs)
    }

    pub fn reconstruct(&self) -> Duration {
        Duration::from_secs(self.reconstruct_secs)
    }

    /// Compression limit, scaled linearly with the page count.
    pub fn compress(&self, pages: usize) -> Duration {
        Duration::from_secs(self.compress_secs_per_page.saturating_mul(pages as u64))
    }

    fn validate(&self) -> Result<(), ConvertError> {
        if self.render_secs == 0 || self.reconstruct_secs == 0 || self.compress_secs_per_page == 0
        {
            return Err(ConvertError::InvalidConfig(
                "timeouts must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

/// Fate of working-area artifacts left behind by a failed run.
///
/// Neither policy ever touches the handoff area on a phase-2 failure: it is
/// read-only input to that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CleanupPolicy {
    /// Leave everything in place for inspection. (default)
    #[default]
    Retain,
    /// Delete page artifacts and intermediate PDFs from the working area.
    Purge,
}
