//! Configuration types for the chat core.
//!
//! Every section is `#[serde(default)]`, so a partial (or empty) TOML file
//! loads with the remaining values at their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capability::simulated::SimulationConfig;
use crate::capability::{
    LanguageDetection, SummarizerOptions, SummaryFormat, SummaryLength, SummaryType,
    TranslatorOptions,
};
use crate::error::{ChatError, Result};
use crate::language::{TargetLanguage, content_length};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub detection: DetectionConfig,
    pub summarizer: SummarizerConfig,
    pub translator: TranslatorConfig,
    pub orchestrator: OrchestratorConfig,
    pub simulation: SimulationConfig,
}

/// Automatic language detection on new user messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run detection on every submitted message.
    pub enabled: bool,
    /// Language a message must be detected as to be offered a summary.
    pub summarize_language: String,
    /// Content must be strictly longer than this many characters.
    pub min_summarize_chars: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            summarize_language: "en".to_owned(),
            min_summarize_chars: 150,
        }
    }
}

impl DetectionConfig {
    /// Whether a message with `content`, whose top-ranked detection is `top`,
    /// should be offered the summarize action.
    #[must_use]
    pub fn allows_summary(&self, top: &LanguageDetection, content: &str) -> bool {
        top.is_language(&self.summarize_language)
            && content_length(content) > self.min_summarize_chars
    }
}

/// Options used for every summarize action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
    pub summary_type: SummaryType,
    pub format: SummaryFormat,
    pub length: SummaryLength,
}

impl SummarizerConfig {
    #[must_use]
    pub fn options(&self) -> SummarizerOptions {
        SummarizerOptions {
            shared_context: self.shared_context.clone(),
            summary_type: self.summary_type,
            format: self.format,
            length: self.length,
        }
    }
}

/// Translation source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Language every message is assumed to be written in.
    pub source_language: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_owned(),
        }
    }
}

impl TranslatorConfig {
    #[must_use]
    pub fn options_for(&self, target: TargetLanguage) -> TranslatorOptions {
        TranslatorOptions::new(self.source_language.clone(), target.code())
    }
}

/// Orchestrator behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Let summarize/translate actions overlap. When false, a request made
    /// while the assistant is composing is refused as busy.
    pub allow_concurrent_actions: bool,
    /// Capacity of the outbound event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            allow_concurrent_actions: false,
            event_capacity: 128,
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/parlance/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.detection.summarize_language.trim().is_empty() {
            return Err(ChatError::Config(
                "detection.summarize_language must not be empty".to_owned(),
            ));
        }
        if self.translator.source_language.trim().is_empty() {
            return Err(ChatError::Config(
                "translator.source_language must not be empty".to_owned(),
            ));
        }
        if self.orchestrator.event_capacity == 0 {
            return Err(ChatError::Config(
                "orchestrator.event_capacity must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
