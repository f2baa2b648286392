//! Invoice header records and denormalized line-item rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered field name → value mapping.
pub type Fields = IndexMap<String, String>;

/// Field names used in assistant replies and exported rows.
pub mod fields {
    pub const DATE: &str = "Fecha";
    pub const INVOICE_NUMBER: &str = "Número de Factura";
    pub const ISSUER_TAX_ID: &str = "CUIT Emisor";
    pub const CUSTOMER: &str = "Cliente";
    pub const TOTAL: &str = "Importe Total";
    pub const VAT: &str = "IVA";
    pub const PRODUCTS: &str = "Detalle de Productos";

    /// Row column carrying the header's `Importe Total`.
    pub const INVOICE_TOTAL: &str = "Importe Total Factura";

    pub const DESCRIPTION: &str = "Descripción";
    pub const QUANTITY: &str = "Cantidad";
    pub const UNIT_PRICE: &str = "Precio Unitario";
    pub const SUBTOTAL: &str = "Subtotal";

    /// Single key of a fallback record.
    pub const RAW: &str = "Datos";

    /// Description of the synthetic row emitted for invoices without products.
    pub const GENERAL_INFO: &str = "Información general";

    /// Header keys recognized in a reply, in template order.
    pub const HEADER: [&str; 6] = [DATE, INVOICE_NUMBER, ISSUER_TAX_ID, CUSTOMER, TOTAL, VAT];
}

/// One invoice as understood from one assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Recognized header fields, in reply order.
    pub header: Fields,

    /// Product sub-records with their keys copied verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Fields>,

    /// Set when the reply could not be structured.
    #[serde(default)]
    pub fallback: bool,
}

impl InvoiceRecord {
    /// Record holding only the raw reply text.
    pub fn fallback(raw: impl Into<String>) -> Self {
        let mut header = Fields::new();
        header.insert(fields::RAW.to_string(), raw.into());
        Self {
            header,
            products: Vec::new(),
            fallback: true,
        }
    }

    /// Header value, or the empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.header.get(key).map(String::as_str).unwrap_or("")
    }

    /// Raw text of a fallback record.
    pub fn raw_text(&self) -> Option<&str> {
        if self.fallback {
            self.header.get(fields::RAW).map(String::as_str)
        } else {
            None
        }
    }

    /// Denormalize the header onto every product row.
    ///
    /// Always yields at least one row: a record without products becomes a
    /// single "Información general" row whose subtotal is the invoice total.
    pub fn line_items(&self) -> Vec<LineItemRow> {
        if self.products.is_empty() {
            let mut row = self.header_columns();
            row.insert(fields::DESCRIPTION.to_string(), fields::GENERAL_INFO.to_string());
            row.insert(fields::SUBTOTAL.to_string(), self.get(fields::TOTAL).to_string());
            if let Some(raw) = self.raw_text() {
                row.insert(fields::RAW.to_string(), raw.to_string());
            }
            return vec![LineItemRow(row)];
        }

        self.products
            .iter()
            .map(|product| {
                let mut row = self.header_columns();
                for (key, value) in product {
                    row.insert(key.clone(), value.clone());
                }
                LineItemRow(row)
            })
            .collect()
    }

    fn header_columns(&self) -> Fields {
        let mut row = Fields::new();
        for (column, source) in [
            (fields::DATE, fields::DATE),
            (fields::INVOICE_NUMBER, fields::INVOICE_NUMBER),
            (fields::ISSUER_TAX_ID, fields::ISSUER_TAX_ID),
            (fields::CUSTOMER, fields::CUSTOMER),
            (fields::INVOICE_TOTAL, fields::TOTAL),
            (fields::VAT, fields::VAT),
        ] {
            row.insert(column.to_string(), self.get(source).to_string());
        }
        row
    }
}

/// A product row with the invoice header copied onto it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemRow(pub Fields);

impl LineItemRow {
    /// Column value, if the row has that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
