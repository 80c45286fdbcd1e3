//! Merge the rebuilt pages in order, compress, and publish the result.

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Step};
use crate::pipeline::handoff::{ensure_dir, move_into, remove_stale, PageFiles};
use crate::progress::ProgressTracker;
use crate::runner::{run_checked, Tool, ToolInvocation, ToolRunner};
use std::path::PathBuf;
use tracing::{info, warn};

pub const MERGE_POINTS: f64 = 2.0;

/// Final artifacts in the output area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeOutput {
    pub merged: PathBuf,
    pub compressed: PathBuf,
}

/// Merge `page-1.pdf … page-N.pdf`, compress, and move both PDFs to the
/// output area. Nothing reaches the output area unless every step succeeded.
pub async fn assemble(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    total: usize,
    progress: &mut ProgressTracker,
) -> Result<SafeOutput, ConvertError> {
    let paths = &config.paths;
    let merged = paths.merged_pdf();
    let compressed = paths.compressed_pdf();

    remove_stale(&merged).await?;
    remove_stale(&compressed).await?;

    progress.step(format!("Merging {total} pages into a single PDF"));
    let merge = ToolInvocation::new(Tool::Pdfunite, config.timeouts.reconstruct())
        .args((1..=total).map(|page| PageFiles::new(page).pdf(&paths.work_dir)))
        .arg(&merged);
    run_checked(runner, Step::MergePages, merge).await?;
    progress.advance(MERGE_POINTS);

    progress.step("Compressing PDF");
    let compress = ToolInvocation::new(Tool::Ps2pdf, config.timeouts.compress(total))
        .arg(&merged)
        .arg(&compressed);
    run_checked(runner, Step::Compress, compress).await?;

    for pdf in [&merged, &compressed] {
        if !pdf.is_file() {
            return Err(ConvertError::filesystem(pdf.as_path(), "expected output PDF is missing"));
        }
    }

    ensure_dir(&paths.safe_dir).await?;
    let published_merged = move_into(&merged, &paths.safe_dir).await?;
    let published_compressed = match move_into(&compressed, &paths.safe_dir).await {
        Ok(path) => path,
        Err(e) => {
            // Half an output is no output.
            if let Err(rm) = tokio::fs::remove_file(&published_merged).await {
                warn!("Could not withdraw {}: {}", published_merged.display(), rm);
            }
            return Err(e);
        }
    };
    let output = SafeOutput {
        merged: published_merged,
        compressed: published_compressed,
    };
    info!("Safe PDF written to {}", output.compressed.display());

    progress.set(100.0);
    progress.step("Safe PDF created");
    Ok(output)
}
