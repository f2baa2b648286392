//! Session-scoped accumulation of invoices and their line items.

use tracing::debug;

use super::record::{InvoiceRecord, LineItemRow};

/// Append-only store of parsed invoices and the rows derived from them.
#[derive(Debug, Clone, Default)]
pub struct InvoiceRecordStore {
    invoices: Vec<InvoiceRecord>,
    line_items: Vec<LineItemRow>,
}

impl InvoiceRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record and its rows. Returns the rows just added.
    pub fn append(&mut self, record: InvoiceRecord) -> &[LineItemRow] {
        let rows = record.line_items();
        let start = self.line_items.len();

        debug!(
            "Storing invoice #{} with {} rows (fallback: {})",
            self.invoices.len() + 1,
            rows.len(),
            record.fallback
        );

        self.invoices.push(record);
        self.line_items.extend(rows);
        &self.line_items[start..]
    }

    /// Drop everything.
    pub fn reset(&mut self) {
        self.invoices.clear();
        self.line_items.clear();
    }

    /// Stored invoices, in upload order.
    pub fn invoices(&self) -> &[InvoiceRecord] {
        &self.invoices
    }

    /// Derived rows, in upload order.
    pub fn line_items(&self) -> &[LineItemRow] {
        &self.line_items
    }

    /// Number of stored invoices.
    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    /// Whether no invoice has been stored.
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}
