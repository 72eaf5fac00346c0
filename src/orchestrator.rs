//! Orchestrator: per-message detection and user-triggered feature actions.
//!
//! The orchestrator owns the [`ConversationState`] and is the only writer of
//! the composing flag. UI collaborators call in through
//! [`Orchestrator::submit_message`], [`Orchestrator::request_summarize`] and
//! [`Orchestrator::request_translate`], and observe results through the
//! [`ChatEvent`] broadcast returned by [`Orchestrator::subscribe`].
//!
//! Detection runs as a spawned task per submitted message. Summarize and
//! translate are async methods the caller awaits; the composing flag is held
//! by a guard for the whole action and released after the outcome (message or
//! notification) has been applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::capability::{
    CapabilityError, CapabilityProvider, Detection, Feature, FeatureKind, Summarization,
    Translation,
};
use crate::config::ChatConfig;
use crate::conversation::{ConversationState, Message, MessageId};
use crate::error::{ChatError, Result};
use crate::language::TargetLanguage;
use crate::observability::{
    FIELD_ACTION, FIELD_MESSAGE_ID, SPAN_ORCHESTRATOR_ACTION, SPAN_ORCHESTRATOR_DETECT,
};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::session::FeatureSession;

/// Notification shown when an action is refused because another is running.
pub const BUSY_NOTIFICATION: &str = "The assistant is still composing a response";

/// Per-message state of the "Summarize" affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffordanceState {
    /// Detection is still probing, provisioning or running.
    Detecting,
    Enabled,
    Disabled,
}

impl AffordanceState {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

/// Outbound notifications for UI collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The full ordered message log after an append.
    MessagesChanged { messages: Vec<Message> },
    ComposingChanged { composing: bool },
    /// Transient, non-blocking notification text.
    Notify { text: String },
    SummarizeAffordanceChanged {
        message_id: MessageId,
        state: AffordanceState,
    },
    /// Model download progress for a session working on `message_id`.
    DownloadProgress {
        feature: FeatureKind,
        message_id: MessageId,
        loaded: u64,
        total: u64,
    },
}

/// Terminal result of a summarize/translate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// An assistant message with this id was appended.
    Appended(MessageId),
    /// The capability is absent or unavailable; a notification was shown.
    Unsupported,
    /// Provisioning or the feature call failed; a notification was shown.
    Failed,
    /// Refused because another action is still composing.
    Busy,
}

/// Handle returned for a newly submitted user message.
#[derive(Debug)]
pub struct Submitted {
    pub message_id: MessageId,
    /// The automatic detection task, if detection ran.
    pub detection: Option<JoinHandle<()>>,
}

/// User-facing text for a failed or unsupported feature session.
#[must_use]
pub fn notification_for(err: &CapabilityError) -> String {
    match err {
        CapabilityError::CapabilityAbsent { feature, .. } => {
            format!("This environment doesn't support the {feature}")
        }
        CapabilityError::CapabilityUnavailable { feature, .. } => {
            format!("The {feature} isn't usable")
        }
        CapabilityError::ProvisioningFailed { feature, message }
        | CapabilityError::InvocationFailed { feature, message } => {
            format!("{} failed: {message}", feature.title())
        }
    }
}

#[derive(Default)]
struct Shared {
    conversation: ConversationState,
    affordances: HashMap<MessageId, AffordanceState>,
    in_flight: usize,
}

struct Inner {
    provider: Arc<dyn CapabilityProvider>,
    config: ChatConfig,
    shared: Mutex<Shared>,
    events: broadcast::Sender<ChatEvent>,
    shutdown: CancellationToken,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }
}

/// Mediates detection, summarize and translate over an injected provider.
///
/// Cloning is cheap; clones share the same conversation and event channel.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn CapabilityProvider>, config: ChatConfig) -> Self {
        let (events, _) = broadcast::channel(config.orchestrator.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                shared: Mutex::new(Shared::default()),
                events,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn provider(&self) -> Arc<dyn CapabilityProvider> {
        Arc::clone(&self.inner.provider)
    }

    /// Current messages and composing flag.
    #[must_use]
    pub fn snapshot(&self) -> ConversationState {
        self.inner.lock().conversation.clone()
    }

    #[must_use]
    pub fn message(&self, message_id: &MessageId) -> Option<Message> {
        self.inner.lock().conversation.get(message_id).cloned()
    }

    /// Latest summarize affordance state for `message_id`.
    #[must_use]
    pub fn affordance(&self, message_id: &MessageId) -> Option<AffordanceState> {
        self.inner.lock().affordances.get(message_id).copied()
    }

    /// Stop outstanding detection tasks at their next suspension point.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Append a user message and start automatic detection for it.
    ///
    /// Input is trimmed; empty or whitespace-only input is ignored and
    /// returns `None`. Detection is spawned on the current Tokio runtime.
    pub fn submit_message(&self, text: &str) -> Option<Submitted> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let message = Message::user(content);
        let message_id = message.id.clone();
        self.append(message);

        if !self.inner.config.detection.enabled {
            self.set_affordance(&message_id, AffordanceState::Disabled);
            return Some(Submitted {
                message_id,
                detection: None,
            });
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%message_id, "no async runtime available; skipping language detection");
            self.set_affordance(&message_id, AffordanceState::Disabled);
            return Some(Submitted {
                message_id,
                detection: None,
            });
        };

        self.set_affordance(&message_id, AffordanceState::Detecting);
        let task = runtime.spawn(
            self.clone()
                .detect(message_id.clone(), content.to_owned()),
        );
        Some(Submitted {
            message_id,
            detection: Some(task),
        })
    }

    /// Summarize the message with `message_id` into a new assistant message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownMessage`] if no such message exists.
    /// Capability failures are not errors: they surface as a notification
    /// and the matching [`ActionOutcome`].
    pub async fn request_summarize(&self, message_id: &MessageId) -> Result<ActionOutcome> {
        let content = self.content_of(message_id)?;
        let options = self.inner.config.summarizer.options();
        Ok(self
            .run_action::<Summarization>("summarize", message_id, options, content)
            .await)
    }

    /// Translate the message with `message_id` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownMessage`] if no such message exists.
    pub async fn request_translate(
        &self,
        message_id: &MessageId,
        target: TargetLanguage,
    ) -> Result<ActionOutcome> {
        let content = self.content_of(message_id)?;
        let options = self.inner.config.translator.options_for(target);
        Ok(self
            .run_action::<Translation>("translate", message_id, options, content)
            .await)
    }

    async fn run_action<F>(
        &self,
        action: &'static str,
        message_id: &MessageId,
        options: F::Options,
        content: String,
    ) -> ActionOutcome
    where
        F: Feature<Output = String>,
    {
        let Some(_composing) = ComposingGuard::acquire(&self.inner) else {
            info!(action, %message_id, "refusing action while composing");
            self.notify(BUSY_NOTIFICATION.to_owned());
            return ActionOutcome::Busy;
        };

        let span = tracing::info_span!(
            SPAN_ORCHESTRATOR_ACTION,
            { FIELD_ACTION } = action,
            { FIELD_MESSAGE_ID } = %message_id,
        );

        async {
            let result = FeatureSession::<F>::new(self.provider(), options)
                .for_message(message_id.as_str())
                .with_progress(self.progress_forwarder(message_id.clone()))
                .run(&content)
                .await;

            match result {
                Ok(text) => {
                    let reply = Message::assistant(text);
                    let reply_id = reply.id.clone();
                    self.append(reply);
                    info!(%reply_id, "appended assistant message");
                    ActionOutcome::Appended(reply_id)
                }
                Err(err) => {
                    info!(error_code = err.code(), "action did not complete");
                    self.notify(notification_for(&err));
                    if err.is_unsupported() {
                        ActionOutcome::Unsupported
                    } else {
                        ActionOutcome::Failed
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn detect(self, message_id: MessageId, content: String) {
        let span = tracing::info_span!(
            SPAN_ORCHESTRATOR_DETECT,
            { FIELD_MESSAGE_ID } = %message_id,
        );

        async {
            let session = FeatureSession::<Detection>::new(self.provider(), ())
                .for_message(message_id.as_str())
                .with_progress(self.progress_forwarder(message_id.clone()));

            let result = tokio::select! {
                () = self.inner.shutdown.cancelled() => {
                    debug!("detection cancelled by shutdown");
                    return;
                }
                result = session.run(&content) => result,
            };

            let state = match result {
                Ok(detections) => match detections.first() {
                    Some(top) => {
                        let enabled = self.inner.config.detection.allows_summary(top, &content);
                        info!(
                            language = %top.detected_language,
                            confidence = top.confidence,
                            enabled,
                            "detection completed"
                        );
                        if enabled {
                            AffordanceState::Enabled
                        } else {
                            AffordanceState::Disabled
                        }
                    }
                    None => {
                        let err = CapabilityError::invocation(
                            Detection::KIND,
                            "detector returned no results",
                        );
                        warn!(error_code = err.code(), "{err}");
                        self.notify(notification_for(&err));
                        AffordanceState::Disabled
                    }
                },
                Err(err) if err.is_unsupported() => {
                    debug!(error_code = err.code(), "detection not available");
                    AffordanceState::Disabled
                }
                Err(err) => {
                    self.notify(notification_for(&err));
                    AffordanceState::Disabled
                }
            };
            self.set_affordance(&message_id, state);
        }
        .instrument(span)
        .await;
    }

    fn content_of(&self, message_id: &MessageId) -> Result<String> {
        self.inner
            .lock()
            .conversation
            .get(message_id)
            .map(|m| m.content.clone())
            .ok_or_else(|| ChatError::UnknownMessage(message_id.to_string()))
    }

    fn append(&self, message: Message) {
        let mut shared = self.inner.lock();
        shared.conversation.append(message);
        self.inner.emit(ChatEvent::MessagesChanged {
            messages: shared.conversation.messages().to_vec(),
        });
    }

    fn set_affordance(&self, message_id: &MessageId, state: AffordanceState) {
        let mut shared = self.inner.lock();
        let previous = shared.affordances.insert(message_id.clone(), state);
        if previous != Some(state) {
            self.inner.emit(ChatEvent::SummarizeAffordanceChanged {
                message_id: message_id.clone(),
                state,
            });
        }
    }

    fn notify(&self, text: String) {
        debug!(%text, "notify");
        self.inner.emit(ChatEvent::Notify { text });
    }

    fn progress_forwarder(&self, message_id: MessageId) -> ProgressCallback {
        let events = self.inner.events.clone();
        Box::new(move |event| {
            if let ProgressEvent::DownloadProgress { feature, progress } = event {
                let _ = events.send(ChatEvent::DownloadProgress {
                    feature,
                    message_id: message_id.clone(),
                    loaded: progress.loaded,
                    total: progress.total,
                });
            }
        })
    }
}

/// Holds one slot of the in-flight action count.
///
/// Composing turns true when the first slot is taken and false when the last
/// one is released.
struct ComposingGuard {
    inner: Arc<Inner>,
}

impl ComposingGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        let mut shared = inner.lock();
        if shared.in_flight > 0 && !inner.config.orchestrator.allow_concurrent_actions {
            return None;
        }
        shared.in_flight += 1;
        if shared.conversation.set_composing(true) {
            inner.emit(ChatEvent::ComposingChanged { composing: true });
        }
        Some(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for ComposingGuard {
    fn drop(&mut self) {
        let mut shared = self.inner.lock();
        shared.in_flight = shared.in_flight.saturating_sub(1);
        if shared.in_flight == 0 && shared.conversation.set_composing(false) {
            self.inner.emit(ChatEvent::ComposingChanged { composing: false });
        }
    }
}
