//! Error types for the facbot-core library.

use thiserror::Error;

/// Main error type for the facbot library.
#[derive(Error, Debug)]
pub enum FacbotError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Remote assistant error.
    #[error("assistant error: {0}")]
    Remote(#[from] RemoteServiceError),

    /// Export error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to opening an uploaded PDF.
///
/// Only raised when the document cannot be opened at all; a single page
/// that yields no text is not an error.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The bytes are not a readable PDF document.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,
}

/// Errors talking to the remote assistant service.
#[derive(Error, Debug)]
pub enum RemoteServiceError {
    /// Transport failure (connection, TLS, timeout, body read).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The run ended in a failed, cancelled or expired state.
    #[error("run did not complete: {0}")]
    RunFailed(String),

    /// The event stream reported an error or ended unexpectedly.
    #[error("stream error: {0}")]
    Stream(String),

    /// A payload from the service could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The run completed without any text reply.
    #[error("assistant returned an empty reply")]
    EmptyReply,

    /// The client is missing credentials or an assistant id.
    #[error("assistant is not configured: {0}")]
    Config(String),
}

/// Errors serializing accumulated line items.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The spreadsheet writer failed.
    #[error("spreadsheet serialization failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// The CSV writer failed.
    #[error("CSV serialization failed: {0}")]
    Csv(String),

    /// There is nothing to export.
    #[error("no line items to export")]
    NoRows,
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}

/// Result type for the facbot library.
pub type Result<T> = std::result::Result<T, FacbotError>;
