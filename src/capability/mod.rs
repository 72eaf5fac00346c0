//! Capability gateway: a uniform view over the on-device feature providers.
//!
//! Three independently-lifecycled features are exposed: language detection,
//! summarization and translation. Each one may be absent from the host
//! environment, reported unavailable, usable immediately, or usable only
//! after a one-time model download.
//!
//! The gateway itself is the [`CapabilityProvider`] trait, injected into the
//! orchestrator instead of being looked up from ambient global state.

pub mod error;
pub mod feature;
pub mod provider;
pub mod simulated;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::CapabilityError;
pub use feature::{
    Detection, Feature, LanguageDetection, SummarizerOptions, SummaryFormat, SummaryLength,
    SummaryType, Summarization, Translation, TranslatorOptions,
};
pub use provider::{
    CapabilityProvider, Created, FeatureInstance, FeatureProvider, ProvisionEvent,
    ProvisioningStream, Readiness, probe, probe_kind,
};
pub use simulated::SimulatedProvider;

/// The three feature families a provider can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Detection,
    Summarization,
    Translation,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 3] = [Self::Detection, Self::Summarization, Self::Translation];

    /// Stable identifier used in logs and host events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Summarization => "summarization",
            Self::Translation => "translation",
        }
    }

    /// Capitalised feature name for user-facing messages ("Summarization failed").
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Detection => "Language detection",
            Self::Summarization => "Summarization",
            Self::Translation => "Translation",
        }
    }
}

impl fmt::Display for FeatureKind {
    /// Renders the provider noun: "language detector", "summarizer", "translator".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = match self {
            Self::Detection => "language detector",
            Self::Summarization => "summarizer",
            Self::Translation => "translator",
        };
        f.write_str(noun)
    }
}

/// A provider's answer to a capability probe.
///
/// Derived fresh for every session; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityAvailability {
    /// Supported "no" answer: the feature exists but cannot be used here.
    #[serde(rename = "no")]
    Unavailable,
    /// An instance can be created and used without any wait.
    #[serde(rename = "readily")]
    Readily,
    /// An instance can be created but needs a model download first.
    #[serde(rename = "after-download")]
    AfterDownload,
}

impl CapabilityAvailability {
    /// Wire name used by provider probes (`no`, `readily`, `after-download`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "no",
            Self::Readily => "readily",
            Self::AfterDownload => "after-download",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "no" | "unavailable" => Some(Self::Unavailable),
            "readily" | "immediately-usable" => Some(Self::Readily),
            "after-download" | "usable-after-download" => Some(Self::AfterDownload),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailable => "unavailable",
            Self::Readily => "immediately-usable",
            Self::AfterDownload => "usable-after-download",
        };
        f.write_str(name)
    }
}

/// A single provisioning progress update.
///
/// Transient: surfaced to logs and observers, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub loaded: u64,
    /// Total bytes expected.
    pub total: u64,
}

impl DownloadProgress {
    #[must_use]
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// Fraction complete in `[0.0, 1.0]`; `0.0` when the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.loaded as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Returns true if `next` does not move either counter backwards.
    #[must_use]
    pub fn is_monotonic_successor(&self, next: &DownloadProgress) -> bool {
        next.loaded >= self.loaded && next.total >= self.total
    }
}
