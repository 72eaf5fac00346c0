//! Feature session: one capability negotiation followed by one feature call.
//!
//! A session walks a strictly forward state machine:
//!
//! ```text
//! Idle -> Probing -> { Unsupported | Ready | Provisioning }
//! Provisioning -> Provisioned
//! { Ready | Provisioned } -> Invoking -> Completed
//! any non-terminal state -> Failed
//! ```
//!
//! The flow is the same for every feature family; the [`Feature`] strategy
//! supplies the provider lookup, options and output type. [`FeatureSession::run`]
//! consumes the session, so a session can never run (or provision) twice.
//! Nothing is retried: a failed session is terminal.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, warn};

use crate::capability::{
    CapabilityAvailability, CapabilityError, CapabilityProvider, DownloadProgress, Feature,
    ProvisionEvent, ProvisioningStream, Readiness,
};
use crate::observability::{FIELD_FEATURE, FIELD_MESSAGE_ID, SPAN_FEATURE_SESSION};
use crate::progress::{ProgressCallback, ProgressEvent};

/// Lifecycle state of a [`FeatureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Probing,
    /// Terminal: the capability is absent or answered "no".
    Unsupported,
    /// Probe answered "readily"; no provisioning wait.
    Ready,
    /// Probe answered "after-download"; waiting for readiness.
    Provisioning,
    Provisioned,
    Invoking,
    /// Terminal: the feature call returned a result.
    Completed,
    /// Terminal: a probe, create, provisioning or invoke step raised.
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Unsupported | Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is a legal forward transition from `self`.
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (Idle, Probing)
                | (Probing, Unsupported | Ready | Provisioning)
                | (Provisioning, Provisioned)
                | (Ready | Provisioned, Invoking)
                | (Invoking, Completed)
        )
    }
}

/// Which step raised, used to classify provider errors.
#[derive(Debug, Clone, Copy)]
enum Step {
    Negotiate,
    Invoke,
}

/// Per-invocation negotiation lifecycle for one feature family.
pub struct FeatureSession<F: Feature> {
    gateway: Arc<dyn CapabilityProvider>,
    options: F::Options,
    message_id: Option<String>,
    progress: Option<ProgressCallback>,
    state: SessionState,
    last_progress: Option<DownloadProgress>,
}

impl<F: Feature> FeatureSession<F> {
    pub fn new(gateway: Arc<dyn CapabilityProvider>, options: F::Options) -> Self {
        Self {
            gateway,
            options,
            message_id: None,
            progress: None,
            state: SessionState::Idle,
            last_progress: None,
        }
    }

    /// Tag the session with the message it works on (for logs only).
    #[must_use]
    pub fn for_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Receive state transitions and download progress.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiate the capability and run one feature call on `input`.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::CapabilityAbsent`] / [`CapabilityError::CapabilityUnavailable`]
    /// when the feature cannot be used (session ends `Unsupported`);
    /// [`CapabilityError::ProvisioningFailed`] / [`CapabilityError::InvocationFailed`]
    /// when a step raised (session ends `Failed`).
    pub async fn run(mut self, input: &str) -> Result<F::Output, CapabilityError> {
        let span = tracing::info_span!(
            SPAN_FEATURE_SESSION,
            { FIELD_FEATURE } = F::KIND.as_str(),
            { FIELD_MESSAGE_ID } = self.message_id.as_deref().unwrap_or("-"),
        );
        self.drive(input).instrument(span).await
    }

    async fn drive(&mut self, input: &str) -> Result<F::Output, CapabilityError> {
        self.transition(SessionState::Probing);

        let Some(provider) = F::resolve(self.gateway.as_ref()) else {
            info!(provider = self.gateway.name(), "capability namespace absent");
            return Err(self.settle(Step::Negotiate, CapabilityError::absent(F::KIND)));
        };

        let availability = provider
            .availability()
            .await
            .map_err(|e| self.settle(Step::Negotiate, e))?;
        debug!(%availability, "probe answered");

        match availability {
            CapabilityAvailability::Unavailable => {
                return Err(self.settle(Step::Negotiate, CapabilityError::unavailable(F::KIND)));
            }
            CapabilityAvailability::Readily => self.transition(SessionState::Ready),
            CapabilityAvailability::AfterDownload => self.transition(SessionState::Provisioning),
        }

        let created = provider
            .create(&self.options)
            .await
            .map_err(|e| self.settle(Step::Negotiate, e))?;

        match created.readiness {
            Readiness::Pending(stream) => {
                if self.state == SessionState::Ready {
                    debug!("provider requested provisioning for a readily available capability");
                }
                self.await_ready(stream).await?;
            }
            Readiness::Ready => {
                if self.state == SessionState::Provisioning {
                    debug!("provider returned a ready instance; skipping provisioning wait");
                }
            }
        }
        if self.state == SessionState::Provisioning {
            self.transition(SessionState::Provisioned);
        }

        self.transition(SessionState::Invoking);
        let output = created
            .instance
            .invoke(input)
            .await
            .map_err(|e| self.settle(Step::Invoke, e))?;

        self.transition(SessionState::Completed);
        info!("feature call completed");
        Ok(output)
    }

    /// Drain the provisioning stream until the readiness event.
    async fn await_ready(&mut self, mut stream: ProvisioningStream) -> Result<(), CapabilityError> {
        while let Some(event) = stream.next().await {
            match event {
                ProvisionEvent::Progress(progress) => self.record_progress(progress),
                ProvisionEvent::Ready => {
                    info!("provisioning complete");
                    self.emit(ProgressEvent::ProvisioningReady { feature: F::KIND });
                    return Ok(());
                }
                ProvisionEvent::Failed(message) => {
                    return Err(self.settle(
                        Step::Negotiate,
                        CapabilityError::provisioning(F::KIND, message),
                    ));
                }
            }
        }
        Err(self.settle(
            Step::Negotiate,
            CapabilityError::provisioning(
                F::KIND,
                "provisioning ended before the instance was ready",
            ),
        ))
    }

    fn record_progress(&mut self, progress: DownloadProgress) {
        if let Some(previous) = self.last_progress {
            if !previous.is_monotonic_successor(&progress) {
                warn!(
                    previous_loaded = previous.loaded,
                    previous_total = previous.total,
                    loaded = progress.loaded,
                    total = progress.total,
                    "provider reported non-monotonic download progress"
                );
            }
        }
        debug!("downloaded {} of {} bytes", progress.loaded, progress.total);
        self.last_progress = Some(progress);
        self.emit(ProgressEvent::DownloadProgress {
            feature: F::KIND,
            progress,
        });
    }

    /// Move to the terminal state matching `err` and normalise its kind.
    ///
    /// Unsupported answers pass through unchanged. Any other error is
    /// reclassified by the step that raised it, so the same failure always
    /// yields the same kind regardless of how the provider labelled it.
    fn settle(&mut self, step: Step, err: CapabilityError) -> CapabilityError {
        if err.is_unsupported() {
            self.transition(SessionState::Unsupported);
            return match err {
                CapabilityError::CapabilityAbsent { message, .. } => {
                    CapabilityError::CapabilityAbsent {
                        feature: F::KIND,
                        message,
                    }
                }
                _ => CapabilityError::CapabilityUnavailable {
                    feature: F::KIND,
                    message: err.message().to_owned(),
                },
            };
        }

        let message = err.message().to_owned();
        let err = match step {
            Step::Negotiate => CapabilityError::provisioning(F::KIND, message),
            Step::Invoke => CapabilityError::invocation(F::KIND, message),
        };
        warn!(error_code = err.code(), error = %err, "feature session failed");
        self.transition(SessionState::Failed);
        err
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "ignoring invalid session transition");
            return;
        }
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        self.emit(ProgressEvent::StateChanged {
            feature: F::KIND,
            state: next,
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }
}
