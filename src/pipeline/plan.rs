//! Content type → conversion strategy.
//!
//! The supported formats are a closed enum, and [`SupportedFormat::plan`] is
//! an exhaustive `match`: adding a format without deciding how to render it
//! is a compile error, so nothing can silently fall through to a default.

use crate::error::ConvertError;
use std::fmt;

/// How the input document becomes the intermediate PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPlan {
    /// Already a PDF; used as-is.
    Passthrough,
    /// Rendered by the office suite with the given export filter.
    OfficeRender(OfficeFilter),
    /// Raster image wrapped into a PDF by the image converter.
    ImageRender,
}

/// LibreOffice PDF export filter, chosen by document family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFilter {
    Writer,
    Calc,
    Impress,
}

impl OfficeFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            OfficeFilter::Writer => "writer_pdf_Export",
            OfficeFilter::Calc => "calc_pdf_Export",
            OfficeFilter::Impress => "impress_pdf_Export",
        }
    }
}

impl fmt::Display for OfficeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every input format the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Pdf,
    Docx,
    Doc,
    Docm,
    Xlsx,
    Xls,
    Pptx,
    Ppt,
    Odt,
    Odg,
    Odp,
    Ods,
    Jpeg,
    Gif,
    Png,
    Tiff,
}

impl SupportedFormat {
    pub const ALL: [SupportedFormat; 16] = [
        SupportedFormat::Pdf,
        SupportedFormat::Docx,
        SupportedFormat::Doc,
        SupportedFormat::Docm,
        SupportedFormat::Xlsx,
        SupportedFormat::Xls,
        SupportedFormat::Pptx,
        SupportedFormat::Ppt,
        SupportedFormat::Odt,
        SupportedFormat::Odg,
        SupportedFormat::Odp,
        SupportedFormat::Ods,
        SupportedFormat::Jpeg,
        SupportedFormat::Gif,
        SupportedFormat::Png,
        SupportedFormat::Tiff,
    ];

    /// Look up a sniffed content type. `None` for anything unsupported.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let format = match mime {
            "application/pdf" => SupportedFormat::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                SupportedFormat::Docx
            }
            "application/msword" => SupportedFormat::Doc,
            "application/vnd.ms-word.document.macroEnabled.12" => SupportedFormat::Docm,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                SupportedFormat::Xlsx
            }
            "application/vnd.ms-excel" => SupportedFormat::Xls,
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                SupportedFormat::Pptx
            }
            "application/vnd.ms-powerpoint" => SupportedFormat::Ppt,
            "application/vnd.oasis.opendocument.text" => SupportedFormat::Odt,
            "application/vnd.oasis.opendocument.graphics" => SupportedFormat::Odg,
            "application/vnd.oasis.opendocument.presentation" => SupportedFormat::Odp,
            "application/vnd.oasis.opendocument.spreadsheet" => SupportedFormat::Ods,
            "image/jpeg" => SupportedFormat::Jpeg,
            "image/gif" => SupportedFormat::Gif,
            "image/png" => SupportedFormat::Png,
            "image/tiff" | "image/x-tiff" => SupportedFormat::Tiff,
            _ => return None,
        };
        Some(format)
    }

    /// Canonical content type for this format.
    pub fn mime(self) -> &'static str {
        match self {
            SupportedFormat::Pdf => "application/pdf",
            SupportedFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            SupportedFormat::Doc => "application/msword",
            SupportedFormat::Docm => "application/vnd.ms-word.document.macroEnabled.12",
            SupportedFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            SupportedFormat::Xls => "application/vnd.ms-excel",
            SupportedFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            SupportedFormat::Ppt => "application/vnd.ms-powerpoint",
            SupportedFormat::Odt => "application/vnd.oasis.opendocument.text",
            SupportedFormat::Odg => "application/vnd.oasis.opendocument.graphics",
            SupportedFormat::Odp => "application/vnd.oasis.opendocument.presentation",
            SupportedFormat::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            SupportedFormat::Jpeg => "image/jpeg",
            SupportedFormat::Gif => "image/gif",
            SupportedFormat::Png => "image/png",
            SupportedFormat::Tiff => "image/tiff",
        }
    }

    pub fn plan(self) -> ConversionPlan {
        use ConversionPlan::*;
        use OfficeFilter::*;
        match self {
            SupportedFormat::Pdf => Passthrough,
            SupportedFormat::Docx | SupportedFormat::Doc | SupportedFormat::Docm => {
                OfficeRender(Writer)
            }
            SupportedFormat::Odt => OfficeRender(Writer),
            SupportedFormat::Xlsx | SupportedFormat::Xls | SupportedFormat::Ods => {
                OfficeRender(Calc)
            }
            SupportedFormat::Pptx | SupportedFormat::Ppt | SupportedFormat::Odp => {
                OfficeRender(Impress)
            }
            // Drawings export through Impress.
            SupportedFormat::Odg => OfficeRender(Impress),
            SupportedFormat::Jpeg
            | SupportedFormat::Gif
            | SupportedFormat::Png
            | SupportedFormat::Tiff => ImageRender,
        }
    }
}

/// Choose the conversion plan for a sniffed content type.
pub fn select_plan(mime: &str) -> Result<ConversionPlan, ConvertError> {
    SupportedFormat::from_mime(mime)
        .map(SupportedFormat::plan)
        .ok_or_else(|| ConvertError::UnsupportedFormat {
            mime_type: mime.to_string(),
        })
}
