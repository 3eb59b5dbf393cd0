use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::chat_stream::HttpBackendConfig;
use crate::core::constants::{
    DEFAULT_APOLOGY, DEFAULT_BASE_URL, DEFAULT_GREETING, DEFAULT_MODEL,
    DEFAULT_SYSTEM_INSTRUCTION,
};
use crate::core::session::SessionSettings;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of an OpenAI-compatible API (e.g., "https://api.openai.com/v1")
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// System prompt sent ahead of every conversation
    pub system_instruction: Option<String>,
    /// First message shown in a fresh or cleared conversation
    pub greeting: Option<String>,
    /// Message appended when a reply fails
    pub error_message: Option<String>,
    /// Print completed replies as rendered HTML
    pub markdown: Option<bool>,
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            greeting: self
                .greeting
                .clone()
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            apology: self
                .error_message
                .clone()
                .unwrap_or_else(|| DEFAULT_APOLOGY.to_string()),
        }
    }

    pub fn backend_config(&self, api_key: String) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_instruction: Some(
                self.system_instruction
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            ),
        }
    }

    pub fn markdown_enabled(&self) -> bool {
        self.markdown.unwrap_or(false)
    }
}

pub fn path_display(path: &Path) -> String {
    path.display().to_string()
}
