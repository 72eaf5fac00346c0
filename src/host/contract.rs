//! Versioned host command/event envelopes for UI integration.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const CONTRACT_VERSION: u32 = 1;

/// Commands a UI host can send to the chat core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "conversation.submit")]
    ConversationSubmit,
    #[serde(rename = "conversation.summarize")]
    ConversationSummarize,
    #[serde(rename = "conversation.translate")]
    ConversationTranslate,
    #[serde(rename = "conversation.snapshot")]
    ConversationSnapshot,
    #[serde(rename = "capability.status")]
    CapabilityStatus,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    pub const ALL: [CommandName; 8] = [
        Self::HostPing,
        Self::HostVersion,
        Self::ConversationSubmit,
        Self::ConversationSummarize,
        Self::ConversationTranslate,
        Self::ConversationSnapshot,
        Self::CapabilityStatus,
        Self::RuntimeStop,
    ];

    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::ConversationSubmit => "conversation.submit",
            Self::ConversationSummarize => "conversation.summarize",
            Self::ConversationTranslate => "conversation.translate",
            Self::ConversationSnapshot => "conversation.snapshot",
            Self::CapabilityStatus => "capability.status",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == raw)
    }
}

/// Event names emitted to the host.
pub mod event_names {
    pub const MESSAGES_CHANGED: &str = "conversation.messages_changed";
    pub const COMPOSING_CHANGED: &str = "conversation.composing_changed";
    pub const NOTIFY: &str = "conversation.notify";
    pub const SUMMARIZE_AFFORDANCE: &str = "message.summarize_affordance";
    pub const DOWNLOAD_PROGRESS: &str = "capability.download_progress";
}

/// A versioned command envelope from host -> core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != CONTRACT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {CONTRACT_VERSION}",
                    self.v
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty",
            ));
        }
        Ok(())
    }
}

/// A versioned response envelope from core -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned, unsolicited event envelope from core -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: CONTRACT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
    InvalidPayload,
}

impl ContractErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "unsupported-version",
            Self::InvalidEnvelope => "invalid-envelope",
            Self::InvalidPayload => "invalid-payload",
        }
    }
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", kind.as_str())]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ContractError> for crate::error::ChatError {
    fn from(err: ContractError) -> Self {
        Self::Host(err.to_string())
    }
}
