//! Configurable in-process capability provider.
//!
//! Stands in for the on-device AI runtime when none is attached (the headless
//! host, demos, tests). Every feature's availability, download behaviour and
//! failure mode is driven by [`SimulationConfig`]. Outputs are deterministic:
//! a common-words English heuristic for detection, first-sentence summaries,
//! and labelled echo translations.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::CapabilityError;
use super::feature::{
    Detection, Feature, LanguageDetection, SummarizerOptions, Summarization, Translation,
    TranslatorOptions,
};
use super::provider::{
    CapabilityProvider, Created, FeatureInstance, FeatureProvider, ProvisionEvent,
    ProvisioningStream,
};
use super::{CapabilityAvailability, DownloadProgress, FeatureKind};
use crate::language::TargetLanguage;

/// Share of common English words at or above which text is reported as `en`.
const ENGLISH_SHARE_THRESHOLD: f32 = 0.2;

/// Common English words used by the detection heuristic.
const COMMON_ENGLISH_WORDS: [&str; 30] = [
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "say",
    "her", "she",
];

fn common_english_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| COMMON_ENGLISH_WORDS.into_iter().collect())
}

/// How a simulated feature answers its availability probe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulatedAvailability {
    /// The namespace is not exposed at all.
    Absent,
    /// The probe answers "no".
    No,
    /// Usable immediately.
    #[default]
    Readily,
    /// Usable after a simulated download.
    AfterDownload,
}

/// Behaviour of one simulated feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedFeatureConfig {
    pub availability: SimulatedAvailability,
    /// Size of the simulated model download in bytes.
    pub download_bytes: u64,
    /// Number of progress events emitted during the download.
    pub download_steps: u32,
    /// Delay before each progress event.
    pub step_delay_ms: u64,
    /// Abort the download halfway with a failure event.
    pub fail_provisioning: bool,
    /// Make every feature call fail with this message.
    pub fail_invocation: Option<String>,
    /// Replace the computed output (for detection: the reported language tag).
    pub fixed_output: Option<String>,
}

impl Default for SimulatedFeatureConfig {
    fn default() -> Self {
        Self {
            availability: SimulatedAvailability::Readily,
            download_bytes: 1000,
            download_steps: 4,
            step_delay_ms: 0,
            fail_provisioning: false,
            fail_invocation: None,
            fixed_output: None,
        }
    }
}

impl SimulatedFeatureConfig {
    /// Shorthand for a feature with the given availability and default behaviour.
    pub fn with_availability(availability: SimulatedAvailability) -> Self {
        Self {
            availability,
            ..Self::default()
        }
    }
}

/// Per-feature simulation settings (`[simulation]` in the config file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub detector: SimulatedFeatureConfig,
    pub summarizer: SimulatedFeatureConfig,
    pub translator: SimulatedFeatureConfig,
}

/// A [`CapabilityProvider`] backed entirely by [`SimulationConfig`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    config: SimulationConfig,
}

impl SimulatedProvider {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    fn feature(settings: &SimulatedFeatureConfig) -> Option<Arc<SimulatedFeature>> {
        if settings.availability == SimulatedAvailability::Absent {
            return None;
        }
        Some(Arc::new(SimulatedFeature {
            settings: settings.clone(),
        }))
    }
}

impl CapabilityProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    fn language_detector(&self) -> Option<Arc<dyn FeatureProvider<Detection>>> {
        Self::feature(&self.config.detector).map(|f| f as Arc<dyn FeatureProvider<Detection>>)
    }

    fn summarizer(&self) -> Option<Arc<dyn FeatureProvider<Summarization>>> {
        Self::feature(&self.config.summarizer)
            .map(|f| f as Arc<dyn FeatureProvider<Summarization>>)
    }

    fn translator(&self) -> Option<Arc<dyn FeatureProvider<Translation>>> {
        Self::feature(&self.config.translator).map(|f| f as Arc<dyn FeatureProvider<Translation>>)
    }
}

struct SimulatedFeature {
    settings: SimulatedFeatureConfig,
}

impl SimulatedFeature {
    fn probe_answer(&self) -> CapabilityAvailability {
        match self.settings.availability {
            SimulatedAvailability::Absent | SimulatedAvailability::No => {
                CapabilityAvailability::Unavailable
            }
            SimulatedAvailability::Readily => CapabilityAvailability::Readily,
            SimulatedAvailability::AfterDownload => CapabilityAvailability::AfterDownload,
        }
    }

    fn build<F: Feature>(
        &self,
        instance: impl FeatureInstance<F> + 'static,
    ) -> Result<Created<F>, CapabilityError> {
        match self.probe_answer() {
            CapabilityAvailability::Unavailable => Err(CapabilityError::provisioning(
                F::KIND,
                "create called on an unavailable capability",
            )),
            CapabilityAvailability::Readily => Ok(Created::ready(instance)),
            CapabilityAvailability::AfterDownload => Ok(Created::pending(
                instance,
                provisioning_stream(&self.settings),
            )),
        }
    }

    fn failure(&self, kind: FeatureKind) -> Option<CapabilityError> {
        self.settings
            .fail_invocation
            .as_ref()
            .map(|message| CapabilityError::invocation(kind, message.clone()))
    }
}

fn provisioning_stream(settings: &SimulatedFeatureConfig) -> ProvisioningStream {
    let total = settings.download_bytes;
    let steps = settings.download_steps.max(1);
    let delay = Duration::from_millis(settings.step_delay_ms);
    let fail_at = settings.fail_provisioning.then_some(steps.div_ceil(2));

    Box::pin(async_stream::stream! {
        let mut failed = false;
        for step in 1..=steps {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let loaded = total * u64::from(step) / u64::from(steps);
            yield ProvisionEvent::Progress(DownloadProgress::new(loaded, total));
            if fail_at == Some(step) {
                failed = true;
                break;
            }
        }
        if failed {
            yield ProvisionEvent::Failed("simulated download interrupted".to_owned());
        } else {
            yield ProvisionEvent::Ready;
        }
    })
}

#[async_trait]
impl FeatureProvider<Detection> for SimulatedFeature {
    async fn availability(&self) -> Result<CapabilityAvailability, CapabilityError> {
        Ok(self.probe_answer())
    }

    async fn create(&self, _options: &()) -> Result<Created<Detection>, CapabilityError> {
        self.build(SimulatedDetector {
            fixed_language: self.settings.fixed_output.clone(),
            failure: self.failure(FeatureKind::Detection),
        })
    }
}

#[async_trait]
impl FeatureProvider<Summarization> for SimulatedFeature {
    async fn availability(&self) -> Result<CapabilityAvailability, CapabilityError> {
        Ok(self.probe_answer())
    }

    async fn create(
        &self,
        _options: &SummarizerOptions,
    ) -> Result<Created<Summarization>, CapabilityError> {
        self.build(SimulatedSummarizer {
            fixed_output: self.settings.fixed_output.clone(),
            failure: self.failure(FeatureKind::Summarization),
        })
    }
}

#[async_trait]
impl FeatureProvider<Translation> for SimulatedFeature {
    async fn availability(&self) -> Result<CapabilityAvailability, CapabilityError> {
        Ok(self.probe_answer())
    }

    async fn create(
        &self,
        options: &TranslatorOptions,
    ) -> Result<Created<Translation>, CapabilityError> {
        self.build(SimulatedTranslator {
            target_language: options.target_language.clone(),
            fixed_output: self.settings.fixed_output.clone(),
            failure: self.failure(FeatureKind::Translation),
        })
    }
}

struct SimulatedDetector {
    fixed_language: Option<String>,
    failure: Option<CapabilityError>,
}

#[async_trait]
impl FeatureInstance<Detection> for SimulatedDetector {
    async fn invoke(&self, input: &str) -> Result<Vec<LanguageDetection>, CapabilityError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if let Some(language) = &self.fixed_language {
            return Ok(vec![LanguageDetection::new(language.clone(), 1.0)]);
        }
        Ok(detect_by_common_words(input))
    }
}

struct SimulatedSummarizer {
    fixed_output: Option<String>,
    failure: Option<CapabilityError>,
}

#[async_trait]
impl FeatureInstance<Summarization> for SimulatedSummarizer {
    async fn invoke(&self, input: &str) -> Result<String, CapabilityError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .fixed_output
            .clone()
            .unwrap_or_else(|| first_sentence_summary(input)))
    }
}

struct SimulatedTranslator {
    target_language: String,
    fixed_output: Option<String>,
    failure: Option<CapabilityError>,
}

#[async_trait]
impl FeatureInstance<Translation> for SimulatedTranslator {
    async fn invoke(&self, input: &str) -> Result<String, CapabilityError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .fixed_output
            .clone()
            .unwrap_or_else(|| labelled_translation(input, &self.target_language)))
    }
}

/// Rank `en` against `und` by the share of common English words in `text`.
fn detect_by_common_words(text: &str) -> Vec<LanguageDetection> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return vec![LanguageDetection::new("und", 1.0)];
    }

    let common = common_english_words();
    let hits = words.iter().filter(|w| common.contains(w.as_str())).count();
    let share = hits as f32 / words.len() as f32;

    let english = LanguageDetection::new("en", share);
    let unknown = LanguageDetection::new("und", 1.0 - share);
    if share >= ENGLISH_SHARE_THRESHOLD {
        vec![english, unknown]
    } else {
        vec![unknown, english]
    }
}

fn first_sentence_summary(text: &str) -> String {
    let first = text.split('.').next().unwrap_or_default().trim();
    format!("Summary: {first}. This is the main point of the message.")
}

fn labelled_translation(text: &str, target: &str) -> String {
    let label = TargetLanguage::parse(target).map_or(target, |lang| lang.label());
    format!("{label} translation: {text} ({target})")
}
