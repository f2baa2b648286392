//! PDF processing module.

mod extractor;

pub use extractor::PdfTextExtractor;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for turning uploaded PDF bytes into plain text.
pub trait TextExtractor {
    /// Extract the text of every page, in page order.
    ///
    /// Fails only when the bytes cannot be opened as a PDF.
    fn extract(&self, pdf: &[u8]) -> Result<String>;
}
