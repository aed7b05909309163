//! Configuration surface consumed by the translation pipeline.
//!
//! Only the keys the pipeline reads are modeled here; the settings UI owns
//! everything else. Files load and save as JSON with missing keys filled
//! from the defaults, so older config files keep working.

use crate::glossary::GlossaryRule;
use crate::replace::ReplacementRule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Request/message dialect family of the target platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiFormat {
    /// Generic chat-completion message list.
    #[serde(rename = "OpenAI")]
    OpenAi,
    /// Chat-completion list rewritten to the role-renamed family
    /// (`assistant` -> `model`, `content` -> `parts`).
    Google,
    /// Specialized single-turn dialect with a fixed system prompt.
    #[serde(rename = "SakuraLLM")]
    SakuraLlm,
}

/// Descriptor of the remote platform one task targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub name: String,
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub api_format: ApiFormat,
}

impl Platform {
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
        api_format: ApiFormat,
    ) -> Self {
        Self {
            name: name.into(),
            api_url: api_url.into(),
            api_key: String::new(),
            model: model.into(),
            api_format,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Per-request wall-clock budget in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default)]
    pub source_language: String,
    #[serde(default)]
    pub target_language: String,

    #[serde(default)]
    pub replace_before_translation_enable: bool,
    #[serde(default)]
    pub replace_before_translation_data: Vec<ReplacementRule>,
    #[serde(default)]
    pub replace_after_translation_enable: bool,
    #[serde(default)]
    pub replace_after_translation_data: Vec<ReplacementRule>,

    #[serde(default)]
    pub glossary_enable: bool,
    #[serde(default)]
    pub glossary_data: Vec<GlossaryRule>,

    #[serde(default)]
    pub custom_prompt_enable: bool,
    #[serde(default)]
    pub custom_prompt_data: String,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            source_language: "Japanese".into(),
            target_language: "Simplified Chinese".into(),
            replace_before_translation_enable: false,
            replace_before_translation_data: Vec::new(),
            replace_after_translation_enable: false,
            replace_after_translation_data: Vec::new(),
            glossary_enable: false,
            glossary_data: Vec::new(),
            custom_prompt_enable: false,
            custom_prompt_data: String::new(),
        }
    }
}

impl TranslatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse translator config")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize translator config")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {}", path.as_ref().display())
        })?;
        Self::from_json(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_json()?;
        fs::write(&path, content).with_context(|| {
            format!("failed to write config file {}", path.as_ref().display())
        })
    }
}
