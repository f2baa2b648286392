//! Invoice records parsed from assistant replies.

mod parser;
mod record;
mod store;

pub use parser::{ParseWarning, ParsedReply, ResponseParser};
pub use record::{fields, Fields, InvoiceRecord, LineItemRow};
pub use store::InvoiceRecordStore;
