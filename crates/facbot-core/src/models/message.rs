//! Chat transcript entries.

use serde::{Deserialize, Serialize};

use crate::invoice::LineItemRow;

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person using the front-end.
    User,
    /// The bot.
    Assistant,
}

/// A single entry in the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,

    /// Message text.
    pub text: String,

    /// Avatar reference for the view layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Line items the message summarizes, rendered as a grid by the view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<LineItemRow>,
}

impl ChatMessage {
    /// A message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            avatar: None,
            table: Vec::new(),
        }
    }

    /// A message written by the bot.
    pub fn assistant(text: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            avatar,
            table: Vec::new(),
        }
    }

    /// Attach a line-item table to the message.
    pub fn with_table(mut self, rows: Vec<LineItemRow>) -> Self {
        self.table = rows;
        self
    }
}
