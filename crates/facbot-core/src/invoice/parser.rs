//! Best-effort decoding of assistant replies into invoice records.

use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use super::record::{fields, Fields, InvoiceRecord};

/// Why a reply was stored as a fallback record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// No `{` followed somewhere by a `}`.
    NoJsonSpan,
    /// The span between the first `{` and the last `}` is not valid JSON.
    InvalidJson(String),
    /// The span decoded to something other than an object.
    NotAnObject,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::NoJsonSpan => write!(f, "no JSON object found in the reply"),
            ParseWarning::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            ParseWarning::NotAnObject => write!(f, "JSON value is not an object"),
        }
    }
}

/// Result of parsing one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// The record to store. A fallback record when `warning` is set.
    pub record: InvoiceRecord,
    /// Set when the reply could not be structured.
    pub warning: Option<ParseWarning>,
}

/// Turns raw assistant replies into [`InvoiceRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a reply. Never fails: unusable replies become fallback records.
    pub fn parse(&self, raw: &str) -> ParsedReply {
        let Some(span) = json_span(raw) else {
            debug!("Reply has no JSON span");
            return fallback(raw, ParseWarning::NoJsonSpan);
        };

        let value: Value = match serde_json::from_str(span) {
            Ok(value) => value,
            Err(e) => {
                debug!("Reply JSON span does not decode: {}", e);
                return fallback(raw, ParseWarning::InvalidJson(e.to_string()));
            }
        };

        let Value::Object(object) = value else {
            return fallback(raw, ParseWarning::NotAnObject);
        };

        let mut record = InvoiceRecord::default();
        for (key, value) in &object {
            if fields::HEADER.contains(&key.as_str()) {
                record.header.insert(key.clone(), stringify(value));
            } else if key == fields::PRODUCTS {
                record.products = products(value);
            } else {
                debug!("Ignoring unrecognized reply key {:?}", key);
            }
        }

        ParsedReply {
            record,
            warning: None,
        }
    }
}

/// Greedy span from the first `{` to the last `}`, inclusive.
///
/// Not brace-balanced: prose braces or several objects widen the span.
fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn fallback(raw: &str, warning: ParseWarning) -> ParsedReply {
    ParsedReply {
        record: InvoiceRecord::fallback(raw),
        warning: Some(warning),
    }
}

fn products(value: &Value) -> Vec<Fields> {
    let Value::Array(items) = value else {
        debug!("{} is not an array, ignoring", fields::PRODUCTS);
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(product) => Some(
                product
                    .iter()
                    .map(|(k, v)| (k.clone(), stringify(v)))
                    .collect(),
            ),
            other => {
                warn!("Skipping product entry {} that is not an object: {}", index, other);
                None
            }
        })
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
