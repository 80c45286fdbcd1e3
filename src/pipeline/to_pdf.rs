//! Render the input document into an intermediate PDF.

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Step};
use crate::pipeline::handoff::remove_stale;
use crate::pipeline::plan::ConversionPlan;
use crate::progress::ProgressTracker;
use crate::runner::{run_checked, Tool, ToolInvocation, ToolRunner};
use std::path::{Path, PathBuf};
use tracing::info;

/// Points added once the intermediate PDF exists (also for passthrough).
pub const RENDER_POINTS: f64 = 3.0;

/// Produce the intermediate PDF for `plan` and return its path.
///
/// `Passthrough` runs no tool; the input itself is the PDF.
pub async fn render_to_pdf(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    plan: ConversionPlan,
    progress: &mut ProgressTracker,
) -> Result<PathBuf, ConvertError> {
    let input = &config.paths.input_file;
    let work = &config.paths.work_dir;
    let timeout = config.timeouts.render();

    let pdf = match plan {
        ConversionPlan::Passthrough => {
            info!("Input is already a PDF");
            input.clone()
        }
        ConversionPlan::OfficeRender(filter) => {
            progress.step("Converting to PDF using LibreOffice");
            let output = intermediate_pdf_path(input, work)?;
            clear_previous(&output, input).await?;
            let invocation = ToolInvocation::new(Tool::LibreOffice, timeout)
                .args(["--headless", "--convert-to"])
                .arg(format!("pdf:{filter}"))
                .arg("--outdir")
                .arg(work)
                .arg(input);
            run_checked(runner, Step::ConvertToPdf, invocation).await?;
            output
        }
        ConversionPlan::ImageRender => {
            progress.step("Converting to PDF using GraphicsMagick");
            let output = intermediate_pdf_path(input, work)?;
            clear_previous(&output, input).await?;
            let invocation = ToolInvocation::new(Tool::GraphicsMagick, timeout)
                .arg("convert")
                .arg(input)
                .arg(&output);
            run_checked(runner, Step::ConvertToPdf, invocation).await?;
            output
        }
    };

    if !pdf.is_file() {
        return Err(ConvertError::filesystem(
            &pdf,
            "intermediate PDF was not produced",
        ));
    }

    progress.advance(RENDER_POINTS);
    Ok(pdf)
}

/// Drop an intermediate PDF left by an earlier run. A renderer that exits
/// cleanly without output must not leave the old one in its place.
async fn clear_previous(output: &Path, input: &Path) -> Result<(), ConvertError> {
    if output == input {
        return Err(ConvertError::filesystem(
            input,
            "input would be overwritten by its own rendering",
        ));
    }
    remove_stale(output).await
}

/// Where the office renderer writes its output: `<work>/<input stem>.pdf`.
///
/// The image path uses the same name so both renderers leave the same file.
pub fn intermediate_pdf_path(input: &Path, work: &Path) -> Result<PathBuf, ConvertError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| ConvertError::filesystem(input, "input path has no file name"))?;
    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(work.join(name))
}
