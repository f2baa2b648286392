//! Configuration structures for the assistant, PDF, chat and export layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FacbotError, Result};

/// Main configuration for facbot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacbotConfig {
    /// Remote assistant configuration.
    pub assistant: AssistantConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Conversation configuration.
    pub chat: ChatConfig,

    /// Export configuration.
    pub export: ExportConfig,
}

/// Remote assistant binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL of the assistants API.
    pub base_url: String,

    /// Opaque identifier of the preconfigured assistant.
    pub assistant_id: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// File holding the API key, read when the environment variable is unset.
    pub api_key_file: Option<PathBuf>,

    /// Per-request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            assistant_id: String::new(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key_file: None,
            timeout_secs: None,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Try to open encrypted PDFs with an empty password.
    pub decrypt_empty_password: bool,

    /// Text inserted between consecutive pages.
    pub page_separator: String,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            decrypt_empty_password: true,
            page_separator: String::new(),
        }
    }
}

/// Conversation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// First assistant message of every session.
    pub greeting: String,

    /// Avatar reference attached to assistant messages.
    pub avatar: Option<String>,

    /// Interpret free text as the add-another/finish answer after an upload.
    pub keyword_decisions: bool,

    /// Substrings that count as "yes, add another invoice".
    pub affirmative_keywords: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: "¡Hola! Soy FacBot. Sube una factura en PDF para procesarla. 🤖".to_string(),
            avatar: Some("avatar.png".to_string()),
            keyword_decisions: false,
            affirmative_keywords: ["sí", "si", "claro", "ok", "otra", "más"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Worksheet name in the xlsx file.
    pub sheet_name: String,

    /// File name without extension.
    pub file_stem: String,

    /// Append a generation timestamp to the file name.
    pub timestamped: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Productos".to_string(),
            file_stem: "productos_facturas".to_string(),
            timestamped: true,
        }
    }
}

impl FacbotConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| FacbotError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| FacbotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
