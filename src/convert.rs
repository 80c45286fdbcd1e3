//! Phase entry points.
//!
//! A [`Converter`] owns the configuration, the tool runner and the progress
//! reporter, and drives one phase to completion. Each phase is all-or-nothing:
//! the first error stops it, is reported as the single failure event at the
//! percentage reached so far, and is returned inside a [`PipelineOutcome`]
//! rather than as an `Err`. The host only ever sees events.

use crate::config::{CleanupPolicy, ConverterConfig, COMPRESSED_PDF_NAME, MERGED_PDF_NAME};
use crate::error::ConvertError;
use crate::output::{Phase, PipelineOutcome};
use crate::pipeline::{assemble, classify, handoff, paginate, plan, rasterize, reconstruct, to_pdf};
use crate::progress::{JsonLinesReporter, ProgressTracker, Reporter};
use crate::runner::{ProcessRunner, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a successful phase produced.
struct Completed {
    pages: usize,
    outputs: Vec<PathBuf>,
}

/// Drives either phase of a sanitisation.
pub struct Converter {
    config: ConverterConfig,
    runner: Arc<dyn ToolRunner>,
    reporter: Reporter,
}

impl Converter {
    pub fn new(config: ConverterConfig, runner: Arc<dyn ToolRunner>, reporter: Reporter) -> Self {
        Self {
            config,
            runner,
            reporter,
        }
    }

    /// Real external tools, JSON-lines progress on stdout.
    pub fn with_system_tools(config: ConverterConfig) -> Self {
        Self::new(
            config,
            Arc::new(ProcessRunner::new()),
            Arc::new(JsonLinesReporter::stdout()),
        )
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run `phase`.
    pub async fn run(&self, phase: Phase) -> PipelineOutcome {
        match phase {
            Phase::DocumentToPixels => self.document_to_pixels().await,
            Phase::PixelsToPdf => self.pixels_to_pdf().await,
        }
    }

    /// Phase 1: untrusted document → raw pixel buffers in the handoff area.
    ///
    /// Reports progress from 0 to 50.
    pub async fn document_to_pixels(&self) -> PipelineOutcome {
        let phase = Phase::DocumentToPixels;
        let mut progress = ProgressTracker::new(self.reporter.clone(), phase.start_percentage());
        let started = Instant::now();
        info!("Starting {}: {}", phase, self.config.paths.input_file.display());

        let result = self.document_to_pixels_inner(&mut progress).await;
        self.finish(phase, progress, result, started).await
    }

    /// Phase 2: pixel buffers → safe PDF in the output area.
    ///
    /// Reports progress from 50 to 100.
    pub async fn pixels_to_pdf(&self) -> PipelineOutcome {
        let phase = Phase::PixelsToPdf;
        let mut progress = ProgressTracker::new(self.reporter.clone(), phase.start_percentage());
        let started = Instant::now();
        info!("Starting {}: {}", phase, self.config.paths.pixels_dir.display());

        let result = self.pixels_to_pdf_inner(&mut progress).await;
        self.finish(phase, progress, result, started).await
    }

    async fn document_to_pixels_inner(
        &self,
        progress: &mut ProgressTracker,
    ) -> Result<Completed, ConvertError> {
        let config = &self.config;
        let runner = self.runner.as_ref();
        config.validate()?;

        // ── Step 1: Input must exist ─────────────────────────────────────
        let input = &config.paths.input_file;
        if !input.is_file() {
            return Err(ConvertError::filesystem(input, "input document not found"));
        }
        handoff::ensure_dir(&config.paths.work_dir).await?;

        // ── Step 2: Classify and plan ────────────────────────────────────
        let mime = classify::classify(input);
        info!("Detected MIME type {}", mime);
        let plan = plan::select_plan(&mime)?;
        debug!("Conversion plan: {:?}", plan);

        // ── Step 3: Intermediate PDF ─────────────────────────────────────
        let pdf = to_pdf::render_to_pdf(runner, config, plan, progress).await?;

        // ── Step 4: One PDF per page ─────────────────────────────────────
        let pages = paginate::split_pages(runner, config, &pdf, progress).await?;

        // ── Step 5: Pixels, then stage for phase 2 ───────────────────────
        rasterize::rasterize_pages(runner, config, pages, progress).await?;
        Ok(Completed {
            pages,
            outputs: Vec::new(),
        })
    }

    async fn pixels_to_pdf_inner(
        &self,
        progress: &mut ProgressTracker,
    ) -> Result<Completed, ConvertError> {
        let config = &self.config;
        let runner = self.runner.as_ref();
        config.validate()?;

        let pages = handoff::count_pages(&config.paths.pixels_dir, "rgb").await?;
        info!("Found {} pages in {}", pages, config.paths.pixels_dir.display());
        handoff::ensure_dir(&config.paths.work_dir).await?;

        reconstruct::reconstruct_pages(runner, config, pages, progress).await?;
        let published = assemble::assemble(runner, config, pages, progress).await?;
        Ok(Completed {
            pages,
            outputs: vec![published.merged, published.compressed],
        })
    }

    /// Turn a phase result into an outcome, emitting the failure event and
    /// applying the cleanup policy when it failed.
    async fn finish(
        &self,
        phase: Phase,
        mut progress: ProgressTracker,
        result: Result<Completed, ConvertError>,
        started: Instant,
    ) -> PipelineOutcome {
        match result {
            Ok(done) => {
                info!(
                    "{} finished: {} pages in {}ms",
                    phase,
                    done.pages,
                    started.elapsed().as_millis()
                );
                PipelineOutcome {
                    phase,
                    success: true,
                    percentage: progress.reported(),
                    message: progress.last_text().to_string(),
                    pages: Some(done.pages),
                    outputs: done.outputs,
                }
            }
            Err(err) => {
                progress.fail(err.to_string());
                if self.config.cleanup == CleanupPolicy::Purge {
                    purge_after_failure(&self.config, phase).await;
                }
                PipelineOutcome {
                    phase,
                    success: false,
                    percentage: progress.reported(),
                    message: progress.last_text().to_string(),
                    pages: None,
                    outputs: Vec::new(),
                }
            }
        }
    }
}

/// Extensions of per-page artifacts each phase leaves in the working area.
fn page_artifacts(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::DocumentToPixels => &["pdf", "png", "rgb", "width", "height"],
        Phase::PixelsToPdf => &["pdf", "png"],
    }
}

/// Best-effort removal of what a failed phase left behind.
///
/// Phase 1 also clears pages it had already staged in the handoff area, so a
/// half-written handoff is never mistaken for a complete one. Phase 2 never
/// touches the handoff area.
async fn purge_after_failure(config: &ConverterConfig, phase: Phase) {
    let paths = &config.paths;
    let mut removed = clear_best_effort(&paths.work_dir, page_artifacts(phase)).await;

    match phase {
        Phase::DocumentToPixels => {
            removed += clear_best_effort(&paths.pixels_dir, &["rgb", "width", "height"]).await;
            if let Ok(pdf) = to_pdf::intermediate_pdf_path(&paths.input_file, &paths.work_dir) {
                if pdf != paths.input_file {
                    removed += remove_if_present(&pdf).await;
                }
            }
        }
        Phase::PixelsToPdf => {
            for name in [MERGED_PDF_NAME, COMPRESSED_PDF_NAME] {
                removed += remove_if_present(&paths.work_dir.join(name)).await;
            }
        }
    }
    info!("Purged {} leftover files after failed {}", removed, phase);
}

async fn clear_best_effort(dir: &Path, extensions: &[&str]) -> usize {
    handoff::clear_pages(dir, extensions)
        .await
        .unwrap_or_else(|e| {
            warn!("Stopped purging {}: {}", dir.display(), e);
            0
        })
}

async fn remove_if_present(path: &Path) -> usize {
    match tokio::fs::remove_file(path).await {
        Ok(()) => 1,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => {
            warn!("Could not remove {}: {}", path.display(), e);
            0
        }
    }
}
