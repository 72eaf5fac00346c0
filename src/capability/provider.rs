//! Provider and instance traits for on-device capabilities.
//!
//! A [`FeatureProvider`] answers availability probes and creates instances.
//! An instance may need provisioning (a model download) before it can be
//! used; in that case [`Created::readiness`] carries a [`ProvisioningStream`]
//! of progress updates terminated by a single readiness event.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use super::error::CapabilityError;
use super::feature::{Detection, Feature, Summarization, Translation};
use super::{CapabilityAvailability, DownloadProgress, FeatureKind};

/// One item of a provisioning stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// Download progress; `loaded` and `total` never decrease.
    Progress(DownloadProgress),
    /// The instance is ready. Emitted exactly once, as the last item.
    Ready,
    /// Provisioning failed; no further items follow.
    Failed(String),
}

/// A boxed stream of provisioning events.
pub type ProvisioningStream = Pin<Box<dyn Stream<Item = ProvisionEvent> + Send>>;

/// Readiness of a freshly created instance.
pub enum Readiness {
    /// Usable right away.
    Ready,
    /// Usable once the stream yields [`ProvisionEvent::Ready`].
    Pending(ProvisioningStream),
}

impl Readiness {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// An instance returned by [`FeatureProvider::create`].
pub struct Created<F: Feature> {
    pub instance: Box<dyn FeatureInstance<F>>,
    pub readiness: Readiness,
}

impl<F: Feature> Created<F> {
    /// An instance that needs no provisioning.
    pub fn ready(instance: impl FeatureInstance<F> + 'static) -> Self {
        Self {
            instance: Box::new(instance),
            readiness: Readiness::Ready,
        }
    }

    /// An instance that becomes usable once `provisioning` reports ready.
    pub fn pending(
        instance: impl FeatureInstance<F> + 'static,
        provisioning: ProvisioningStream,
    ) -> Self {
        Self {
            instance: Box::new(instance),
            readiness: Readiness::Pending(provisioning),
        }
    }
}

/// Availability probing and instance creation for one feature family.
#[async_trait]
pub trait FeatureProvider<F: Feature>: Send + Sync {
    /// Query current availability. Never cached by callers.
    async fn availability(&self) -> Result<CapabilityAvailability, CapabilityError>;

    /// Request an instance.
    ///
    /// Must not be called when [`availability`](Self::availability) answered
    /// [`CapabilityAvailability::Unavailable`].
    async fn create(&self, options: &F::Options) -> Result<Created<F>, CapabilityError>;
}

/// A usable (or soon usable) feature instance.
#[async_trait]
pub trait FeatureInstance<F: Feature>: Send + Sync {
    /// Run one feature call on `input`.
    async fn invoke(&self, input: &str) -> Result<F::Output, CapabilityError>;
}

/// The host environment's capability namespace.
///
/// Each accessor returns `None` when the environment does not expose that
/// feature family at all.
pub trait CapabilityProvider: Send + Sync {
    /// Provider name for logs (e.g. `"simulated"`).
    fn name(&self) -> &str;

    fn language_detector(&self) -> Option<Arc<dyn FeatureProvider<Detection>>>;

    fn summarizer(&self) -> Option<Arc<dyn FeatureProvider<Summarization>>>;

    fn translator(&self) -> Option<Arc<dyn FeatureProvider<Translation>>>;
}

/// Probe one feature family on `gateway`.
///
/// # Errors
///
/// Returns [`CapabilityError::CapabilityAbsent`] when the namespace is
/// missing, or whatever error the provider's probe raised.
pub async fn probe<F: Feature>(
    gateway: &dyn CapabilityProvider,
) -> Result<CapabilityAvailability, CapabilityError> {
    let Some(provider) = F::resolve(gateway) else {
        return Err(CapabilityError::absent(F::KIND));
    };
    provider.availability().await
}

/// Probe the family named by `kind`; the runtime counterpart of [`probe`].
///
/// # Errors
///
/// Same as [`probe`].
pub async fn probe_kind(
    gateway: &dyn CapabilityProvider,
    kind: FeatureKind,
) -> Result<CapabilityAvailability, CapabilityError> {
    match kind {
        FeatureKind::Detection => probe::<Detection>(gateway).await,
        FeatureKind::Summarization => probe::<Summarization>(gateway).await,
        FeatureKind::Translation => probe::<Translation>(gateway).await,
    }
}
