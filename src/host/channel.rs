//! Host command channel and router over the [`Orchestrator`].

use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityAvailability, CapabilityError, FeatureKind, probe_kind};
use crate::conversation::MessageId;
use crate::error::{ChatError, Result};
use crate::host::contract::{
    CONTRACT_VERSION, CommandEnvelope, CommandName, ContractError, ContractErrorKind,
    EventEnvelope, ResponseEnvelope, event_names,
};
use crate::language::TargetLanguage;
use crate::orchestrator::{ActionOutcome, ChatEvent, Orchestrator};

/// Upper bound on how long a closing server waits for accepted work.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

/// Sends commands to a [`HostCommandServer`] and receives its events.
#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    /// Validate and dispatch one command, waiting for its response.
    ///
    /// Routing failures (bad payloads, unknown message ids) come back as an
    /// error [`ResponseEnvelope`]; only contract violations and a closed
    /// server are `Err`.
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            ChatError::Host(format!(
                "invalid host command envelope {}: {e}",
                envelope.request_id
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| ChatError::Channel(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| ChatError::Channel(format!("host command response dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

/// Routes host commands to the orchestrator and republishes its events.
pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    chat_rx: broadcast::Receiver<ChatEvent>,
    orchestrator: Orchestrator,
    tasks: TaskTracker,
}

#[must_use]
pub fn command_channel(
    request_capacity: usize,
    event_capacity: usize,
    orchestrator: Orchestrator,
) -> (HostCommandClient, HostCommandServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    let chat_rx = orchestrator.subscribe();

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            chat_rx,
            orchestrator,
            tasks: TaskTracker::new(),
        },
    )
}

impl HostCommandServer {
    /// Serve requests and forward orchestrator events until every client is dropped.
    ///
    /// Before returning, waits (bounded by a timeout) for accepted detection,
    /// summarize and translate work to finish and forwards the events it
    /// produced. The event sender is dropped on return, so subscribers see
    /// `RecvError::Closed` only after the last outcome event.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.request_rx.recv() => {
                    let Some(request) = request else { break };
                    let response = self.respond(&request.envelope).await;
                    let _ = request.response_tx.send(response);
                }
                event = self.chat_rx.recv() => match event {
                    Ok(event) => self.forward(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "host event relay lagged; some events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("orchestrator event channel closed");
                    }
                },
            }
        }
        debug!("host command channel closed; draining accepted work");
        self.drain().await;
        debug!("host command server exiting");
    }

    async fn drain(&mut self) {
        self.tasks.close();
        let tasks = self.tasks.clone();
        let finished = tasks.wait();
        tokio::pin!(finished);
        let deadline = tokio::time::sleep(DRAIN_TIMEOUT);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut finished => break,
                () = &mut deadline => {
                    warn!(
                        pending = self.tasks.len(),
                        "accepted host work still running at shutdown"
                    );
                    break;
                }
                event = self.chat_rx.recv() => match event {
                    Ok(event) => self.forward(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "host event relay lagged; some events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        loop {
            match self.chat_rx.try_recv() {
                Ok(event) => self.forward(&event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged = n, "host event relay lagged; some events were dropped");
                }
                Err(_) => break,
            }
        }
    }

    async fn respond(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        match self.route(envelope).await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = envelope.command.as_str(), error = %e, "host command failed");
                ResponseEnvelope::error(envelope.request_id.clone(), e.to_string())
            }
        }
    }

    /// Route a command envelope to the orchestrator.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let request_id = envelope.request_id.clone();
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(request_id, json!({"pong": true}))),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                request_id,
                json!({
                    "contract_version": CONTRACT_VERSION,
                    "package_version": env!("CARGO_PKG_VERSION"),
                    "channel": "parlance_host_v1"
                }),
            )),
            CommandName::ConversationSubmit => self.handle_submit(envelope),
            CommandName::ConversationSummarize => self.handle_summarize(envelope),
            CommandName::ConversationTranslate => self.handle_translate(envelope),
            CommandName::ConversationSnapshot => self.handle_snapshot(envelope),
            CommandName::CapabilityStatus => Ok(self.handle_capability_status(envelope).await),
            CommandName::RuntimeStop => {
                self.orchestrator.shutdown();
                Ok(ResponseEnvelope::ok(request_id, json!({"stopping": true})))
            }
        }
    }

    fn handle_submit(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let text = required_str(&envelope.payload, "text", envelope.command)?;
        let payload = match self.orchestrator.submit_message(text) {
            Some(submitted) => {
                if let Some(detection) = submitted.detection {
                    self.tasks.spawn(async move {
                        let _ = detection.await;
                    });
                }
                json!({
                    "accepted": true,
                    "message_id": submitted.message_id,
                })
            }
            None => json!({"accepted": false, "reason": "empty message"}),
        };
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }

    fn handle_summarize(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let message_id = self.existing_message(envelope)?;

        let orchestrator = self.orchestrator.clone();
        let task_id = message_id.clone();
        self.tasks.spawn(async move {
            log_outcome("summarize", &task_id, orchestrator.request_summarize(&task_id).await);
        });

        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            json!({"accepted": true, "message_id": message_id}),
        ))
    }

    fn handle_translate(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let message_id = self.existing_message(envelope)?;
        let raw = required_str(&envelope.payload, "language", envelope.command)?;
        let language = TargetLanguage::parse(raw).ok_or_else(|| {
            ContractError::new(
                ContractErrorKind::InvalidPayload,
                format!("unsupported target language: {raw}"),
            )
        })?;

        let orchestrator = self.orchestrator.clone();
        let task_id = message_id.clone();
        self.tasks.spawn(async move {
            log_outcome(
                "translate",
                &task_id,
                orchestrator.request_translate(&task_id, language).await,
            );
        });

        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            json!({
                "accepted": true,
                "message_id": message_id,
                "language": language.code(),
            }),
        ))
    }

    fn handle_snapshot(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let snapshot = self.orchestrator.snapshot();
        let payload = serde_json::to_value(&snapshot)
            .map_err(|e| ChatError::Host(format!("failed to serialize snapshot: {e}")))?;
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }

    async fn handle_capability_status(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        let provider = self.orchestrator.provider();
        let gateway = provider.as_ref();
        let mut features = serde_json::Map::new();
        for kind in FeatureKind::ALL {
            let status = status_value(probe_kind(gateway, kind).await);
            features.insert(kind.as_str().to_owned(), status.into());
        }

        ResponseEnvelope::ok(
            envelope.request_id.clone(),
            json!({
                "provider": provider.name(),
                "features": features,
            }),
        )
    }

    fn existing_message(&self, envelope: &CommandEnvelope) -> Result<MessageId> {
        let raw = required_str(&envelope.payload, "message_id", envelope.command)?;
        let message_id = MessageId::from(raw);
        if self.orchestrator.message(&message_id).is_none() {
            return Err(ChatError::UnknownMessage(raw.to_owned()));
        }
        Ok(message_id)
    }

    fn forward(&self, event: &ChatEvent) {
        let envelope = event_envelope(event);
        let _ = self.event_tx.send(envelope);
    }
}

/// Convert an orchestrator event to its wire envelope.
#[must_use]
pub fn event_envelope(event: &ChatEvent) -> EventEnvelope {
    let (name, payload) = match event {
        ChatEvent::MessagesChanged { messages } => {
            (event_names::MESSAGES_CHANGED, json!({"messages": messages}))
        }
        ChatEvent::ComposingChanged { composing } => {
            (event_names::COMPOSING_CHANGED, json!({"composing": composing}))
        }
        ChatEvent::Notify { text } => (event_names::NOTIFY, json!({"text": text})),
        ChatEvent::SummarizeAffordanceChanged { message_id, state } => (
            event_names::SUMMARIZE_AFFORDANCE,
            json!({
                "message_id": message_id,
                "state": state,
                "enabled": state.is_enabled(),
            }),
        ),
        ChatEvent::DownloadProgress {
            feature,
            message_id,
            loaded,
            total,
        } => (
            event_names::DOWNLOAD_PROGRESS,
            json!({
                "feature": feature.as_str(),
                "message_id": message_id,
                "loaded": loaded,
                "total": total,
            }),
        ),
    };
    EventEnvelope::new(uuid::Uuid::new_v4().to_string(), name, payload)
}

fn status_value(result: std::result::Result<CapabilityAvailability, CapabilityError>) -> String {
    match result {
        Ok(availability) => availability.as_str().to_owned(),
        Err(CapabilityError::CapabilityAbsent { .. }) => "absent".to_owned(),
        Err(e) => {
            warn!(error = %e, "capability probe failed");
            "error".to_owned()
        }
    }
}

fn log_outcome(action: &str, message_id: &MessageId, outcome: Result<ActionOutcome>) {
    match outcome {
        Ok(outcome) => info!(action, %message_id, ?outcome, "host action finished"),
        Err(e) => warn!(action, %message_id, error = %e, "host action failed"),
    }
}

fn required_str<'a>(
    payload: &'a serde_json::Value,
    key: &str,
    command: CommandName,
) -> Result<&'a str> {
    payload
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            ContractError::new(
                ContractErrorKind::InvalidPayload,
                format!("{} requires payload.{key}", command.as_str()),
            )
            .into()
        })
}
