//! Chat transcripts as stored under the chat history directory.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::utils::{sanitize_filename, title_case};

const UNTITLED_STEM: &str = "Untitled_Chat";
const STEM_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model", alias = "bot")]
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// On-disk transcript: `{summary, history, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default = "default_summary")]
    pub summary: String,

    #[serde(default)]
    pub history: Vec<ChatMessage>,

    #[serde(default = "default_timestamp")]
    pub timestamp: String,
}

fn default_summary() -> String {
    "Untitled Chat".to_string()
}

fn default_timestamp() -> String {
    "1970-01-01T00:00:00".to_string()
}

impl Transcript {
    /// Build a transcript from a conversation, deriving its file name and summary from the
    /// first non-blank user message.
    pub fn from_history(history: Vec<ChatMessage>, now: DateTime<Local>) -> (String, Self) {
        let stem = Self::stem_for(&history);
        let file_name = format!("{}_{}.json", stem, now.format("%y%m%d%H%M%S"));
        let transcript = Self {
            summary: title_case(&stem.replace('_', " ")),
            history,
            timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        };
        (file_name, transcript)
    }

    fn stem_for(history: &[ChatMessage]) -> String {
        history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
            .map(|c| {
                let head: String = c.chars().take(STEM_CHARS).collect();
                sanitize_filename(&head.replace(' ', "_"))
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNTITLED_STEM.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Flatten into the single text block that gets chunked and embedded.
    pub fn render(&self) -> String {
        let lines = self
            .history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Chat Summary: {}\n\n{}", self.summary, lines)
    }
}
