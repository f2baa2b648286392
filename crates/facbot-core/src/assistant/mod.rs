//! Remote assistant used for invoice extraction and free-form chat.

mod client;
mod prompt;

pub use client::AssistantClient;
pub use prompt::{extraction_prompt, strip_citations};

use crate::error::RemoteServiceError;

/// Result type for assistant calls.
pub type Result<T> = std::result::Result<T, RemoteServiceError>;

/// A conversational service that answers one message per call.
///
/// Implementations return only the complete reply; any streaming happens
/// inside the call.
#[allow(async_fn_in_trait)]
pub trait Assistant {
    /// Ask for the structured JSON representation of an invoice's text.
    async fn extract_invoice(&self, invoice_text: &str) -> Result<String>;

    /// Send a free-form chat turn.
    async fn chat(&self, message: &str) -> Result<String>;
}
