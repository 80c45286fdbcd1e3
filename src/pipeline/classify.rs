//! Content-type sniffing from magic bytes (never from the file name).
//!
//! The input arrives under a fixed name with no extension, and even if it
//! had one it would be attacker-controlled. The type is decided from the
//! bytes alone:
//!
//! * plain signatures for PDF and the raster formats,
//! * ZIP containers are opened and classified by their members (ODF
//!   `mimetype` entry, OOXML part names and `[Content_Types].xml`),
//! * OLE2 compound files are classified by the UTF-16 stream names found in
//!   their directory (`WordDocument`, `Workbook`, `PowerPoint Document`).
//!
//! Anything else is reported as a normal, unsupported type.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_ZIP: &str = "application/zip";
pub const MIME_OLE: &str = "application/x-ole-storage";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_UNKNOWN: &str = "application/octet-stream";

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Most of an OLE2 file that is searched for stream names.
const MAX_OLE_SCAN: u64 = 100 * 1024 * 1024; // 100MB

/// Sniff the canonical content type of the file at `path`.
///
/// Never fails: unreadable files are reported as `application/octet-stream`,
/// which no conversion plan accepts.
pub fn classify(path: &Path) -> String {
    match sniff(path) {
        Ok(mime) => {
            debug!("Sniffed {} as {}", path.display(), mime);
            mime
        }
        Err(e) => {
            warn!("Could not read {} for sniffing: {}", path.display(), e);
            MIME_UNKNOWN.to_string()
        }
    }
}

fn sniff(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 16];
    let bytes_read = read_up_to(&mut file, &mut header)?;
    let head = &header[..bytes_read];

    let mime = match head {
        [] => MIME_EMPTY.to_string(),
        [0x25, 0x50, 0x44, 0x46, 0x2D, ..] => MIME_PDF.to_string(),
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg".to_string(),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png".to_string(),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif".to_string(),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => "image/tiff".to_string(),
        [0x50, 0x4B, 0x03, 0x04, ..] => {
            file.rewind()?;
            classify_zip(file)
        }
        _ if head.starts_with(&OLE_MAGIC) => {
            file.rewind()?;
            classify_ole(&read_capped(file, MAX_OLE_SCAN)?).to_string()
        }
        _ => {
            file.rewind()?;
            if is_likely_text(&mut file)? {
                MIME_TEXT.to_string()
            } else {
                MIME_UNKNOWN.to_string()
            }
        }
    };
    Ok(mime)
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn read_capped<R: Read>(reader: R, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(limit).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Classify a ZIP-based office container by its members.
fn classify_zip<R: Read + Seek>(reader: R) -> String {
    let mut archive = match ZipArchive::new(reader) {
        Ok(a) => a,
        Err(e) => {
            debug!("ZIP signature but unreadable archive: {e}");
            return MIME_ZIP.to_string();
        }
    };

    // ODF: an uncompressed `mimetype` member holds the type verbatim.
    if let Ok(mut entry) = archive.by_name("mimetype") {
        let mut declared = String::new();
        if entry.by_ref().take(256).read_to_string(&mut declared).is_ok() {
            let declared = declared.trim();
            if declared.starts_with("application/vnd.oasis.opendocument.") {
                return declared.to_string();
            }
        }
    }

    let content_types = read_member(&mut archive, "[Content_Types].xml", 256 * 1024);
    if has_member(&mut archive, "word/document.xml") {
        if content_types.contains("macroEnabled") {
            return "application/vnd.ms-word.document.macroEnabled.12".to_string();
        }
        return "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            .to_string();
    }
    if has_member(&mut archive, "xl/workbook.xml") {
        return "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string();
    }
    if has_member(&mut archive, "ppt/presentation.xml") {
        return "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            .to_string();
    }
    MIME_ZIP.to_string()
}

fn has_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> bool {
    archive.by_name(name).is_ok()
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str, limit: u64) -> String {
    let mut out = String::new();
    if let Ok(entry) = archive.by_name(name) {
        // Partial or non-UTF-8 content just means "no hint".
        let _ = entry.take(limit).read_to_string(&mut out);
    }
    out
}

/// Classify a legacy OLE2 compound document by its stream names.
fn classify_ole(bytes: &[u8]) -> &'static str {
    if contains_utf16(bytes, "WordDocument") {
        "application/msword"
    } else if contains_utf16(bytes, "Workbook") {
        "application/vnd.ms-excel"
    } else if contains_utf16(bytes, "PowerPoint Document") {
        "application/vnd.ms-powerpoint"
    } else if contains_utf16(bytes, "Book") {
        // Excel 5/95 stream name.
        "application/vnd.ms-excel"
    } else {
        MIME_OLE
    }
}

fn contains_utf16(haystack: &[u8], needle: &str) -> bool {
    let encoded: Vec<u8> = needle.encode_utf16().flat_map(u16::to_le_bytes).collect();
    haystack.windows(encoded.len()).any(|w| w == encoded.as_slice())
}

/// Valid UTF-8 and mostly printable in the first 4 KiB.
fn is_likely_text<R: Read>(reader: &mut R) -> std::io::Result<bool> {
    let mut buffer = Vec::with_capacity(4096);
    reader.take(4096).read_to_end(&mut buffer)?;
    if buffer.is_empty() {
        return Ok(false);
    }
    // A multi-byte sequence cut at the 4 KiB boundary is still text.
    let text = match std::str::from_utf8(&buffer) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Ok(false),
    };
    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    Ok(printable as f64 / total as f64 > 0.95)
}
