//! Split the intermediate PDF into one PDF per page.

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Step};
use crate::pipeline::handoff::{clear_pages, count_pages, page_index};
use crate::progress::ProgressTracker;
use crate::runner::{run_checked, Tool, ToolInvocation, ToolRunner};
use std::path::Path;
use tracing::info;

pub const PAGINATE_POINTS: f64 = 2.0;

/// Burst `pdf` into `<work>/page-N.pdf` files and return `N`.
///
/// The page count is taken from the files actually produced, not from any
/// metadata inside the (untrusted) PDF. Page files left in the working area
/// by an earlier run are removed first so they cannot be counted.
pub async fn split_pages(
    runner: &dyn ToolRunner,
    config: &ConverterConfig,
    pdf: &Path,
    progress: &mut ProgressTracker,
) -> Result<usize, ConvertError> {
    let work = &config.paths.work_dir;
    progress.step("Separating document into pages");

    let is_page_file = pdf.parent() == Some(work.as_path())
        && pdf
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| page_index(n, "pdf").is_some());
    if is_page_file {
        return Err(ConvertError::filesystem(
            pdf,
            "document collides with the page file names in the working area",
        ));
    }
    clear_pages(work, &["pdf", "png", "rgb", "width", "height"]).await?;

    let pattern = work.join("page-%d.pdf");
    let invocation = ToolInvocation::new(Tool::Pdftk, config.timeouts.render())
        .arg(pdf)
        .args(["burst", "output"])
        .arg(&pattern);
    run_checked(runner, Step::SplitPages, invocation).await?;

    let pages = count_pages(work, "pdf").await?;
    info!("Document has {} pages", pages);

    progress.advance(PAGINATE_POINTS);
    Ok(pages)
}
