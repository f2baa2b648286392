//! Extraction instruction and reply cleanup.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // File-search citation markers such as 【4:0†source】
    static ref CITATION: Regex = Regex::new(r"【.*?】").unwrap();
}

const INSTRUCTION: &str = r#"Extraé la siguiente información de esta factura en formato JSON:
{"Fecha": "...", "Número de Factura": "...", "CUIT Emisor": "...",
"Cliente": "...", "Importe Total": "...", "IVA": "...",
"Detalle de Productos": [
    {"Descripción": "...", "Cantidad": "...", "Precio Unitario": "...", "Subtotal": "..."}
]}

Es muy importante que "Detalle de Productos" sea un array de objetos con la información de cada producto.

El texto de la factura es:
"#;

/// Full extraction message: the fixed instruction followed by the invoice text.
pub fn extraction_prompt(invoice_text: &str) -> String {
    format!("{INSTRUCTION}{invoice_text}")
}

/// Remove citation markers the service inserts into replies.
pub fn strip_citations(reply: &str) -> String {
    CITATION.replace_all(reply, "").into_owned()
}
