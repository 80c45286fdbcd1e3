//! The trust boundary between the two phases.
//!
//! Phase 1 leaves exactly three files per page in the handoff area:
//! `page-N.rgb` (raw interleaved 8-bit RGB), `page-N.width` and
//! `page-N.height` (decimal integers). Nothing else crosses. Phase 2 treats
//! the area as read-only and re-checks every buffer against its recorded
//! dimensions before any tool touches it, since the producer is untrusted.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Deterministic artifact names for one 1-based page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFiles {
    pub page: usize,
}

impl PageFiles {
    pub fn new(page: usize) -> Self {
        Self { page }
    }

    /// `page-N` with no extension (used as an output base by some tools).
    pub fn base(&self, dir: &Path) -> PathBuf {
        dir.join(format!("page-{}", self.page))
    }

    pub fn pdf(&self, dir: &Path) -> PathBuf {
        self.with_ext(dir, "pdf")
    }

    pub fn png(&self, dir: &Path) -> PathBuf {
        self.with_ext(dir, "png")
    }

    pub fn rgb(&self, dir: &Path) -> PathBuf {
        self.with_ext(dir, "rgb")
    }

    pub fn width(&self, dir: &Path) -> PathBuf {
        self.with_ext(dir, "width")
    }

    pub fn height(&self, dir: &Path) -> PathBuf {
        self.with_ext(dir, "height")
    }

    /// The three files that cross the boundary.
    pub fn staged(&self, dir: &Path) -> [PathBuf; 3] {
        [self.rgb(dir), self.width(dir), self.height(dir)]
    }

    fn with_ext(&self, dir: &Path, ext: &str) -> PathBuf {
        dir.join(format!("page-{}.{}", self.page, ext))
    }
}

/// Dimensions of a page's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
}

impl PageDimensions {
    /// Bytes a raw RGB buffer of these dimensions must contain.
    pub fn rgb_len(&self) -> u64 {
        (u64::from(self.width) * u64::from(self.height)).saturating_mul(3)
    }

    /// `WxH`, as the image converter's `-size` argument expects.
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Extract `N` from a name of the form `page-N.<ext>`.
pub fn page_index(file_name: &str, ext: &str) -> Option<usize> {
    let digits = file_name.strip_prefix("page-")?.strip_suffix(ext)?.strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&n| n >= 1)
}

/// Count the `page-N.<ext>` files in `dir`, requiring them to be exactly `1..=N`.
///
/// Zero pages is an error: there is nothing to weight progress by and
/// nothing to produce.
pub async fn count_pages(dir: &Path, ext: &str) -> Result<usize, ConvertError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::io(dir, e))?;
    let mut indices = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(dir, e))?
    {
        if let Some(n) = entry.file_name().to_str().and_then(|name| page_index(name, ext)) {
            indices.push(n);
        }
    }
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() {
        return Err(ConvertError::filesystem(
            dir,
            format!("no pages found (expected page-N.{ext} files)"),
        ));
    }
    if let Some((pos, _)) = indices.iter().enumerate().find(|&(i, &n)| n != i + 1) {
        return Err(ConvertError::filesystem(
            PageFiles::new(pos + 1).with_ext(dir, ext),
            format!("page {} is missing ({} page files present)", pos + 1, indices.len()),
        ));
    }
    debug!("Found {} page-*.{} files in {}", indices.len(), ext, dir.display());
    Ok(indices.len())
}

/// Persist a page's dimensions next to its pixel buffer.
pub async fn write_dimensions(
    files: PageFiles,
    dir: &Path,
    dims: PageDimensions,
) -> Result<(), ConvertError> {
    let w = files.width(dir);
    tokio::fs::write(&w, dims.width.to_string())
        .await
        .map_err(|e| ConvertError::io(&w, e))?;
    let h = files.height(dir);
    tokio::fs::write(&h, dims.height.to_string())
        .await
        .map_err(|e| ConvertError::io(&h, e))?;
    Ok(())
}

/// Read and validate a page's recorded dimensions.
pub async fn read_dimensions(files: PageFiles, dir: &Path) -> Result<PageDimensions, ConvertError> {
    let width = read_dimension(&files.width(dir)).await?;
    let height = read_dimension(&files.height(dir)).await?;
    Ok(PageDimensions { width, height })
}

async fn read_dimension(path: &Path) -> Result<u32, ConvertError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConvertError::io(path, e))?;
    parse_dimension(&raw).ok_or_else(|| {
        ConvertError::filesystem(
            path,
            format!("expected a positive decimal integer, found {:?}", truncate(&raw, 32)),
        )
    })
}

fn parse_dimension(raw: &str) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|&v| v > 0)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Check that a pixel buffer holds exactly `width * height * 3` bytes.
pub async fn verify_pixel_buffer(path: &Path, dims: PageDimensions) -> Result<(), ConvertError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConvertError::io(path, e))?;
    if !meta.is_file() {
        return Err(ConvertError::filesystem(path, "pixel buffer is not a regular file"));
    }
    if meta.len() != dims.rgb_len() {
        return Err(ConvertError::filesystem(
            path,
            format!(
                "pixel buffer has {} bytes, expected {} for {} RGB",
                meta.len(),
                dims.rgb_len(),
                dims.size_arg()
            ),
        ));
    }
    Ok(())
}

/// Move a file into `dest_dir`, keeping its name.
///
/// Falls back to copy + remove when the staging areas are separate mounts;
/// the copy lands in a temporary file first so the destination never holds
/// a partial artifact.
pub async fn move_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, ConvertError> {
    let name = src
        .file_name()
        .ok_or_else(|| ConvertError::filesystem(src, "not a file path"))?;
    let dest = dest_dir.join(name);

    if tokio::fs::rename(src, &dest).await.is_ok() {
        return Ok(dest);
    }
    copy_into(src, dest_dir, &dest).await?;
    Ok(dest)
}

/// Copy `src` to `dest` through a temporary file in `dest_dir`, then remove `src`.
async fn copy_into(src: &Path, dest_dir: &Path, dest: &Path) -> Result<(), ConvertError> {
    let (src_owned, dest_dir_owned, dest_owned) =
        (src.to_path_buf(), dest_dir.to_path_buf(), dest.to_path_buf());
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&dest_dir_owned)?;
        let mut input = std::fs::File::open(&src_owned)?;
        std::io::copy(&mut input, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest_owned).map_err(|e| e.error)?;
        std::fs::remove_file(&src_owned)
    })
    .await
    .map_err(|e| ConvertError::filesystem(src, format!("move task panicked: {e}")))?
    .map_err(|e| ConvertError::io(dest, e))?;

    debug!("Copied {} → {}", src.display(), dest.display());
    Ok(())
}

/// Remove every `page-N.<ext>` file in `dir` for the given extensions and
/// return how many went.
///
/// Stops at the first file that cannot be removed. A missing directory
/// holds no pages.
pub async fn clear_pages(dir: &Path, extensions: &[&str]) -> Result<usize, ConvertError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ConvertError::io(dir, e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(dir, e))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if extensions.iter().any(|ext| page_index(name, ext).is_some()) {
            remove_stale(&entry.path()).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("Cleared {} stale page files from {}", removed, dir.display());
    }
    Ok(removed)
}

/// Remove `path` if it exists, so a tool that exits cleanly without writing
/// it cannot pass off an older file as its output.
pub async fn remove_stale(path: &Path) -> Result<(), ConvertError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConvertError::io(path, e)),
    }
}

/// Make sure `dir` exists.
pub async fn ensure_dir(dir: &Path) -> Result<(), ConvertError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::io(dir, e))
}
