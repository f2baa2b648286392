//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::{debug, warn};

use super::{Result, TextExtractor};
use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// Page-by-page text extractor.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    decrypt_empty_password: bool,
    page_separator: String,
}

impl PdfTextExtractor {
    /// Create an extractor with default settings.
    pub fn new() -> Self {
        Self::from_config(&PdfConfig::default())
    }

    /// Create an extractor from the PDF configuration section.
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            decrypt_empty_password: config.decrypt_empty_password,
            page_separator: config.page_separator.clone(),
        }
    }

    fn open(&self, data: &[u8]) -> Result<(Document, Option<Vec<u8>>)> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if !doc.is_encrypted() {
            return Ok((doc, None));
        }

        if !self.decrypt_empty_password || doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }
        debug!("Decrypted PDF with empty password");

        // pdf-extract needs the decrypted bytes for its own pass
        let mut decrypted = Vec::new();
        doc.save_to(&mut decrypted)
            .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {e}")))?;
        Ok((doc, Some(decrypted)))
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, pdf: &[u8]) -> Result<String> {
        let (doc, decrypted) = self.open(pdf)?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            warn!("PDF has no pages");
            return Ok(String::new());
        }

        let pages: Vec<String> = page_numbers
            .iter()
            .map(|&number| match doc.extract_text(&[number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!("No text extracted from page {}: {}", number, e);
                    String::new()
                }
            })
            .collect();

        let text = join_pages(&pages, &self.page_separator);
        if !text.trim().is_empty() {
            debug!("Extracted {} chars from {} pages", text.len(), pages.len());
            return Ok(text);
        }

        // Some encodings are only understood by pdf-extract
        let source = decrypted.as_deref().unwrap_or(pdf);
        match pdf_extract::extract_text_from_mem(source) {
            Ok(text) => {
                debug!("pdf-extract pass recovered {} chars", text.len());
                Ok(text)
            }
            Err(e) => {
                warn!("pdf-extract pass failed: {}", e);
                Ok(text)
            }
        }
    }
}

/// Concatenate page texts in order. Empty pages keep their slot.
fn join_pages(pages: &[String], separator: &str) -> String {
    pages.join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes() {
        let extractor = PdfTextExtractor::new();
        let result = extractor.extract(b"this is not a pdf");
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_empty_input() {
        let extractor = PdfTextExtractor::new();
        assert!(extractor.extract(&[]).is_err());
    }

    /// One page per entry; an empty string makes a page with no text.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pages_extracted_in_order() {
        let pdf = build_pdf(&["Uno", "", "Tres"]);

        let text = PdfTextExtractor::new().extract(&pdf).unwrap();
        let uno = text.find("Uno").unwrap();
        let tres = text.find("Tres").unwrap();
        assert!(uno < tres);
        assert_eq!(text.trim().lines().filter(|l| !l.trim().is_empty()).count(), 2);
    }

    #[test]
    fn test_blank_page_keeps_its_slot() {
        let pdf = build_pdf(&["Uno", "", "Tres"]);
        let config = PdfConfig {
            page_separator: "|".to_string(),
            ..PdfConfig::default()
        };

        let text = PdfTextExtractor::from_config(&config).extract(&pdf).unwrap();
        let pages: Vec<&str> = text.split('|').map(str::trim).collect();
        assert_eq!(pages, vec!["Uno", "", "Tres"]);
    }

    #[test]
    fn test_join_pages_keeps_order_and_blank_pages() {
        let pages = vec!["uno".to_string(), String::new(), "tres".to_string()];
        assert_eq!(join_pages(&pages, ""), "unotres");
        assert_eq!(join_pages(&pages, "\n"), "uno\n\ntres");
    }

    #[test]
    fn test_separator_from_config() {
        let config = PdfConfig {
            decrypt_empty_password: false,
            page_separator: "\n\n".to_string(),
        };
        let extractor = PdfTextExtractor::from_config(&config);
        assert_eq!(extractor.page_separator, "\n\n");
        assert!(!extractor.decrypt_empty_password);
    }
}
