//! Pipeline stages for document sanitisation.
//!
//! Each submodule implements exactly one transformation step. Stages run
//! strictly in order, one external tool at a time, and every stage owns the
//! files it creates until it hands them on or deletes them.
//!
//! ## Data Flow
//!
//! ```text
//! phase 1 (document-to-pixels)
//!   classify ──▶ plan ──▶ to_pdf ──▶ paginate ──▶ rasterize ──▶ handoff
//!   (sniff)     (table)   (office/   (pdftk)      (pdftocairo,   (stage .rgb
//!                          image)                  gm)            + dims)
//!
//! ─────────────────────── trust boundary: raw RGB only ───────────────────────
//!
//! phase 2 (pixels-to-pdf)
//!   handoff ──▶ reconstruct ──▶ assemble
//!   (discover)  (gm / tesseract) (pdfunite, ps2pdf)
//! ```
//!
//! 1. [`classify`]: sniff the real content type from magic bytes
//! 2. [`plan`]: map that type to a [`plan::ConversionPlan`] or reject it
//! 3. [`to_pdf`]: render the input to an intermediate PDF
//! 4. [`paginate`]: burst the PDF into one file per page and count them
//! 5. [`rasterize`]: per page: PDF → PNG → raw RGB, recording dimensions
//! 6. [`handoff`]: page file naming, pixel-buffer checks, staging moves
//! 7. [`reconstruct`]: per page: raw RGB → PDF, optionally with a text layer
//! 8. [`assemble`]: merge pages in order and compress

pub mod assemble;
pub mod classify;
pub mod handoff;
pub mod paginate;
pub mod plan;
pub mod rasterize;
pub mod reconstruct;
pub mod to_pdf;

/// Points of progress covered by the per-page loop of either phase.
pub const PAGE_SPAN: f64 = 45.0;
