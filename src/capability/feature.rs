//! Per-kind strategy objects for the generic feature session.
//!
//! The negotiation flow is identical for every feature; only the options,
//! the output type and the provider lookup differ. Each [`Feature`] marker
//! type captures exactly those differences.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::FeatureKind;
use super::provider::{CapabilityProvider, FeatureProvider};

/// Strategy describing one feature family.
pub trait Feature: Sized + Send + Sync + 'static {
    /// Which family this strategy represents.
    const KIND: FeatureKind;

    /// Instance creation options.
    type Options: Clone + fmt::Debug + Send + Sync + 'static;

    /// Result of one feature call.
    type Output: Send + 'static;

    /// Look up this family's provider on the gateway.
    ///
    /// `None` means the environment does not expose the capability namespace.
    fn resolve(gateway: &dyn CapabilityProvider) -> Option<Arc<dyn FeatureProvider<Self>>>;
}

/// Language detection: no options, ranked detections out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detection;

impl Feature for Detection {
    const KIND: FeatureKind = FeatureKind::Detection;
    type Options = ();
    type Output = Vec<LanguageDetection>;

    fn resolve(gateway: &dyn CapabilityProvider) -> Option<Arc<dyn FeatureProvider<Self>>> {
        gateway.language_detector()
    }
}

/// Summarization: text in, summary text out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Summarization;

impl Feature for Summarization {
    const KIND: FeatureKind = FeatureKind::Summarization;
    type Options = SummarizerOptions;
    type Output = String;

    fn resolve(gateway: &dyn CapabilityProvider) -> Option<Arc<dyn FeatureProvider<Self>>> {
        gateway.summarizer()
    }
}

/// Translation: text in, translated text out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translation;

impl Feature for Translation {
    const KIND: FeatureKind = FeatureKind::Translation;
    type Options = TranslatorOptions;
    type Output = String;

    fn resolve(gateway: &dyn CapabilityProvider) -> Option<Arc<dyn FeatureProvider<Self>>> {
        gateway.translator()
    }
}

/// One ranked entry reported by a language detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// BCP 47 language tag (e.g. `"en"`, `"de"`, `"und"`).
    pub detected_language: String,
    /// Detector confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl LanguageDetection {
    pub fn new(detected_language: impl Into<String>, confidence: f32) -> Self {
        Self {
            detected_language: detected_language.into(),
            confidence,
        }
    }

    /// Returns true if this detection names `code` (primary subtag match).
    #[must_use]
    pub fn is_language(&self, code: &str) -> bool {
        crate::language::same_primary_language(&self.detected_language, code)
    }
}

/// Style of summary requested from the summarizer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryType {
    #[default]
    #[serde(rename = "key-points")]
    KeyPoints,
    #[serde(rename = "tl;dr", alias = "tldr")]
    Tldr,
    #[serde(rename = "teaser")]
    Teaser,
    #[serde(rename = "headline")]
    Headline,
}

/// Output markup for summaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryFormat {
    #[default]
    #[serde(rename = "markdown")]
    Markdown,
    #[serde(rename = "plain-text", alias = "plain")]
    PlainText,
}

/// Target summary length.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// Options passed to the summarizer when an instance is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerOptions {
    /// Background shared by every input summarized with this instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
    #[serde(rename = "type", default)]
    pub summary_type: SummaryType,
    #[serde(default)]
    pub format: SummaryFormat,
    #[serde(default)]
    pub length: SummaryLength,
}

/// Options passed to the translator when an instance is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorOptions {
    pub source_language: String,
    pub target_language: String,
}

impl TranslatorOptions {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}
