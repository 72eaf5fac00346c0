//! Progress event types for capability negotiation.
//!
//! Provides callback-based progress reporting that decouples the feature
//! session from whoever presents it (host events, logs, tests).

use crate::capability::{DownloadProgress, FeatureKind};
use crate::session::SessionState;

/// Progress events emitted by a feature session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The session entered a new lifecycle state.
    StateChanged {
        feature: FeatureKind,
        state: SessionState,
    },

    /// Model download progress while provisioning.
    DownloadProgress {
        feature: FeatureKind,
        progress: DownloadProgress,
    },

    /// Provisioning finished; the instance is usable.
    ProvisioningReady { feature: FeatureKind },
}

impl ProgressEvent {
    /// The feature this event belongs to.
    #[must_use]
    pub fn feature(&self) -> FeatureKind {
        match self {
            Self::StateChanged { feature, .. }
            | Self::DownloadProgress { feature, .. }
            | Self::ProvisioningReady { feature } => *feature,
        }
    }
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;
