//! Rendering surfaces for docview.
//!
//! The page scanner is backend independent; the pdfium surface is only built with the
//! `pdf` feature.

#[cfg(feature = "pdf")]
mod pdfium;
mod scan;

#[cfg(feature = "pdf")]
pub use pdfium::{bind_pdfium, PdfiumSurface, PDFIUM_LIBRARY_ENV};
pub use scan::{scan_pages, CancellationToken, PageText, ScanSummary};
