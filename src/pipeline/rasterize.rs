//! Per-page rasterisation: page PDF → PNG → raw RGB pixel buffer.
//!
//! Each page goes through two tool calls. The PNG is only a carrier for
//! reading dimensions and is deleted as soon as the raw buffer exists; the
//! buffer is then checked against those dimensions so a short or padded
//! write can never be staged for phase 2.

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Step};
use crate::pipeline::handoff::{
    clear_pages, ensure_dir, move_into, verify_pixel_buffer, write_dimensions, PageDimensions,
    PageFiles,
};
use crate::pipeline::PAGE_SPAN;
use crate::progress::ProgressTracker;
use crate::runner::{run_checked, Tool, ToolInvocation, ToolRunner};
use std::path::Path;
use tracing::debug;

/// Convert every page to pixels, then stage all buffers and dimensions in
/// the handoff area.
pub async fn rasterize_pages(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    total: usize,
    progress: &mut ProgressTracker,
) -> Result<(), ConvertError> {
    let start = progress.percentage();

    for page in 1..=total {
        progress.step(format!("Converting page {page}/{total} to pixels"));
        let dims = rasterize_page(runner, config, page, total).await?;
        debug!("Page {}/{} → {}", page, total, dims.size_arg());
        progress.set_page_fraction(start, PAGE_SPAN, page, total);
    }

    progress.step("Converted document to pixels");

    stage_pixels(&config.paths.work_dir, &config.paths.pixels_dir, total).await
}

/// Rasterise one page in the working area.
pub async fn rasterize_page(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    page: usize,
    total: usize,
) -> Result<PageDimensions, ConvertError> {
    let work = &config.paths.work_dir;
    let files = PageFiles::new(page);
    let timeout = config.timeouts.render();
    let png = files.png(work);
    let rgb = files.rgb(work);

    let to_png = ToolInvocation::new(Tool::Pdftocairo, timeout)
        .arg(files.pdf(work))
        .args(["-png", "-singlefile"])
        .arg(files.base(work));
    run_checked(runner, Step::PageToPng { page, total }, to_png).await?;

    let dims = png_dimensions(&png).await?;
    write_dimensions(files, work, dims).await?;

    let mut rgb_target = std::ffi::OsString::from("rgb:");
    rgb_target.push(&rgb);
    let to_rgb = ToolInvocation::new(Tool::GraphicsMagick, timeout)
        .arg("convert")
        .arg(&png)
        .args(["-depth", "8"])
        .arg(rgb_target);
    run_checked(runner, Step::PngToPixels { page, total }, to_rgb).await?;

    tokio::fs::remove_file(&png)
        .await
        .map_err(|e| ConvertError::io(&png, e))?;

    verify_pixel_buffer(&rgb, dims).await?;
    Ok(dims)
}

/// Read a rendered PNG's width and height without decoding its pixels.
async fn png_dimensions(png: &Path) -> Result<PageDimensions, ConvertError> {
    let path = png.to_path_buf();
    let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
        .await
        .map_err(|e| ConvertError::filesystem(png, format!("dimension task panicked: {e}")))?
        .map_err(|e| ConvertError::filesystem(png, format!("unreadable page image: {e}")))?;
    if width == 0 || height == 0 {
        return Err(ConvertError::filesystem(png, "page image has zero area"));
    }
    Ok(PageDimensions { width, height })
}

/// Move every page's buffer and dimension files into the handoff area,
/// replacing whatever pages an earlier document left there.
async fn stage_pixels(work: &Path, pixels_dir: &Path, total: usize) -> Result<(), ConvertError> {
    ensure_dir(pixels_dir).await?;
    clear_pages(pixels_dir, &["rgb", "width", "height"]).await?;
    for page in 1..=total {
        for file in PageFiles::new(page).staged(work) {
            move_into(&file, pixels_dir).await?;
        }
    }
    debug!("Staged {} pages in {}", total, pixels_dir.display());
    Ok(())
}
