//! Error taxonomy for capability negotiation.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`CapabilityError::code()`].
//!
//! Two of the four kinds are *normal negative outcomes* rather than faults:
//! [`CapabilityAbsent`](CapabilityError::CapabilityAbsent) and
//! [`CapabilityUnavailable`](CapabilityError::CapabilityUnavailable). Use
//! [`CapabilityError::is_unsupported()`] to tell them apart from real failures.

use super::FeatureKind;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The environment does not expose this feature family at all.
    pub const CAPABILITY_ABSENT: &str = "CAPABILITY_ABSENT";

    /// The provider answered the probe with "no".
    pub const CAPABILITY_UNAVAILABLE: &str = "CAPABILITY_UNAVAILABLE";

    /// Probing, instance creation or model download raised.
    pub const PROVISIONING_FAILED: &str = "PROVISIONING_FAILED";

    /// The feature call itself raised.
    pub const INVOCATION_FAILED: &str = "INVOCATION_FAILED";
}

/// Errors produced while negotiating or invoking a capability.
///
/// The Display impl formats as `[CODE] feature: message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Probe/namespace missing entirely.
    #[error("[{}] {feature}: {message}", error_codes::CAPABILITY_ABSENT)]
    CapabilityAbsent {
        feature: FeatureKind,
        message: String,
    },

    /// Probe returned the supported "no" answer.
    #[error("[{}] {feature}: {message}", error_codes::CAPABILITY_UNAVAILABLE)]
    CapabilityUnavailable {
        feature: FeatureKind,
        message: String,
    },

    /// Download or creation step raised.
    #[error("[{}] {feature}: {message}", error_codes::PROVISIONING_FAILED)]
    ProvisioningFailed {
        feature: FeatureKind,
        message: String,
    },

    /// The feature call raised (malformed input, provider-internal failure).
    #[error("[{}] {feature}: {message}", error_codes::INVOCATION_FAILED)]
    InvocationFailed {
        feature: FeatureKind,
        message: String,
    },
}

impl CapabilityError {
    pub fn absent(feature: FeatureKind) -> Self {
        Self::CapabilityAbsent {
            feature,
            message: "capability namespace is not exposed by this environment".to_owned(),
        }
    }

    pub fn unavailable(feature: FeatureKind) -> Self {
        Self::CapabilityUnavailable {
            feature,
            message: "provider reported the capability as unavailable".to_owned(),
        }
    }

    pub fn provisioning(feature: FeatureKind, message: impl Into<String>) -> Self {
        Self::ProvisioningFailed {
            feature,
            message: message.into(),
        }
    }

    pub fn invocation(feature: FeatureKind, message: impl Into<String>) -> Self {
        Self::InvocationFailed {
            feature,
            message: message.into(),
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapabilityAbsent { .. } => error_codes::CAPABILITY_ABSENT,
            Self::CapabilityUnavailable { .. } => error_codes::CAPABILITY_UNAVAILABLE,
            Self::ProvisioningFailed { .. } => error_codes::PROVISIONING_FAILED,
            Self::InvocationFailed { .. } => error_codes::INVOCATION_FAILED,
        }
    }

    /// Returns the feature kind the error belongs to.
    pub fn feature(&self) -> FeatureKind {
        match self {
            Self::CapabilityAbsent { feature, .. }
            | Self::CapabilityUnavailable { feature, .. }
            | Self::ProvisioningFailed { feature, .. }
            | Self::InvocationFailed { feature, .. } => *feature,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::CapabilityAbsent { message, .. }
            | Self::CapabilityUnavailable { message, .. }
            | Self::ProvisioningFailed { message, .. }
            | Self::InvocationFailed { message, .. } => message,
        }
    }

    /// Returns true if the capability simply cannot be used here.
    ///
    /// Absent and unavailable capabilities are expected answers, not faults:
    /// callers disable the affordance instead of reporting an error.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::CapabilityAbsent { .. } | Self::CapabilityUnavailable { .. }
        )
    }
}
