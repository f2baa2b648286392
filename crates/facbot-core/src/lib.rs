//! Core library for conversational invoice digitization.
//!
//! This crate provides:
//! - PDF text extraction (lopdf with a pdf-extract fallback pass)
//! - A client for a hosted assistants-style language model
//! - Best-effort parsing of the assistant's JSON reply into invoice records
//! - Accumulation of line items and xlsx/CSV export
//! - The session state machine that drives a chat-style front-end

pub mod assistant;
pub mod error;
pub mod export;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod session;

pub use assistant::{Assistant, AssistantClient};
pub use error::{ExportError, FacbotError, PdfError, RemoteServiceError, Result};
pub use export::{ExportArtifact, ExportFormat, ExportService};
pub use invoice::{InvoiceRecord, InvoiceRecordStore, LineItemRow, ParseWarning, ResponseParser};
pub use models::config::FacbotConfig;
pub use models::message::{ChatMessage, Role};
pub use pdf::{PdfTextExtractor, TextExtractor};
pub use session::{
    ButtonId, ConversationController, Envelope, Event, EventId, Notice, NoticeLevel, Phase,
    Session, TurnOutcome, TurnReport, View,
};
