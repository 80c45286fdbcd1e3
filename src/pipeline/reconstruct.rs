//! Per-page reconstruction: raw RGB pixel buffer → single-page PDF.
//!
//! Without text recognition a page is one `gm convert` call. With it, the
//! pixels go through a transient PNG which tesseract turns directly into a
//! searchable PDF page (image plus invisible text layer); the PNG is removed
//! once the page PDF exists.

use crate::config::{ConverterConfig, OcrSetting};
use crate::error::{ConvertError, Step};
use crate::pipeline::handoff::{
    read_dimensions, remove_stale, verify_pixel_buffer, PageDimensions, PageFiles,
};
use crate::pipeline::PAGE_SPAN;
use crate::progress::ProgressTracker;
use crate::runner::{run_checked, Tool, ToolInvocation, ToolRunner};
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

/// Rebuild every page found in the handoff area into `<work>/page-N.pdf`.
pub async fn reconstruct_pages(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    total: usize,
    progress: &mut ProgressTracker,
) -> Result<(), ConvertError> {
    let start = progress.percentage();
    let searchable = if config.ocr.is_enabled() { "searchable " } else { "" };

    for page in 1..=total {
        progress.step(format!(
            "Converting page {page}/{total} from pixels to {searchable}PDF"
        ));
        reconstruct_page(runner, config, page, total).await?;
        progress.set_page_fraction(start, PAGE_SPAN, page, total);
    }
    Ok(())
}

/// Rebuild a single page.
pub async fn reconstruct_page(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    page: usize,
    total: usize,
) -> Result<(), ConvertError> {
    let pixels = &config.paths.pixels_dir;
    let work = &config.paths.work_dir;
    let files = PageFiles::new(page);

    let dims = read_dimensions(files, pixels).await?;
    let rgb = files.rgb(pixels);
    verify_pixel_buffer(&rgb, dims).await?;
    debug!("Page {}/{}: {} pixels", page, total, dims.size_arg());

    // The working area may still hold phase 1's untrusted page-N.pdf.
    let pdf = files.pdf(work);
    remove_stale(&pdf).await?;
    remove_stale(&files.png(work)).await?;

    let timeout = config.timeouts.reconstruct();
    match &config.ocr {
        OcrSetting::Disabled => {
            let invocation = raw_rgb_convert(timeout, dims, &rgb, "pdf", &pdf);
            run_checked(runner, Step::PixelsToPdf { page, total }, invocation).await?;
        }
        OcrSetting::Enabled { language } => {
            let png = files.png(work);
            let invocation = raw_rgb_convert(timeout, dims, &rgb, "png", &png);
            run_checked(runner, Step::PixelsToPng { page, total }, invocation).await?;

            let ocr = ToolInvocation::new(Tool::Tesseract, timeout)
                .arg(&png)
                .arg(files.base(work))
                .args(["-l", language.as_str(), "--dpi"])
                .arg(config.ocr_dpi.to_string())
                .arg("pdf");
            run_checked(runner, Step::Ocr { page, total }, ocr).await?;

            tokio::fs::remove_file(&png)
                .await
                .map_err(|e| ConvertError::io(&png, e))?;
        }
    }

    if !pdf.is_file() {
        return Err(ConvertError::filesystem(&pdf, "page PDF was not produced"));
    }
    Ok(())
}

/// `gm convert -size WxH -depth 8 rgb:<rgb> <format>:<output>`
fn raw_rgb_convert(
    timeout: std::time::Duration,
    dims: PageDimensions,
    rgb: &Path,
    format: &str,
    output: &Path,
) -> ToolInvocation {
    ToolInvocation::new(Tool::GraphicsMagick, timeout)
        .arg("convert")
        .args(["-size", dims.size_arg().as_str(), "-depth", "8"])
        .arg(prefixed("rgb:", rgb))
        .arg(prefixed(&format!("{format}:"), output))
}

fn prefixed(prefix: &str, path: &Path) -> OsString {
    let mut s = OsString::from(prefix);
    s.push(path);
    s
}
