//! Parlance: a chat core that augments messages with optional on-device AI
//! features (language detection, summarization and translation).
//!
//! Each feature is backed by a capability that may be absent, unavailable,
//! usable immediately, or usable only after a one-time model download. The
//! crate negotiates those capabilities and orchestrates the resulting async
//! work without blocking the conversation.
//!
//! # Architecture
//!
//! - **Capability gateway** ([`capability`]): provider/instance traits
//!   injected into the core, plus a configurable [`SimulatedProvider`]
//! - **Feature session** ([`session`]): one generic probe → provision →
//!   invoke state machine shared by all three features
//! - **Orchestrator** ([`orchestrator`]): auto-detection on new messages and
//!   user-triggered summarize/translate actions
//! - **Conversation state** ([`conversation`]): the append-only message log
//!   and the composing flag
//! - **Host bridge** ([`host`]): JSON-lines command/event contract for UIs

pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod host;
pub mod language;
pub mod observability;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod session;

pub use capability::{CapabilityError, CapabilityProvider, SimulatedProvider};
pub use config::ChatConfig;
pub use conversation::{ConversationState, Message, MessageId, Role};
pub use error::{ChatError, Result};
pub use language::TargetLanguage;
pub use orchestrator::{ActionOutcome, AffordanceState, ChatEvent, Orchestrator};
pub use progress::{ProgressCallback, ProgressEvent};
pub use session::{FeatureSession, SessionState};
