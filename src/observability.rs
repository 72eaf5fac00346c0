//! Structured tracing span names and field keys.
//!
//! Spans follow the hierarchy:
//!
//! ```text
//! parlance.orchestrator.action
//!   └─> parlance.feature.session
//! parlance.orchestrator.detect
//!   └─> parlance.feature.session
//! ```

/// Span for one user-triggered action (summarize / translate).
pub const SPAN_ORCHESTRATOR_ACTION: &str = "parlance.orchestrator.action";

/// Span for the automatic detection run on a new user message.
pub const SPAN_ORCHESTRATOR_DETECT: &str = "parlance.orchestrator.detect";

/// Span for one feature session (probe → provision → invoke).
pub const SPAN_FEATURE_SESSION: &str = "parlance.feature.session";

/// Feature kind field (`detection`, `summarization`, `translation`).
pub const FIELD_FEATURE: &str = "feature";

/// Message identifier field.
pub const FIELD_MESSAGE_ID: &str = "message_id";

/// Action name field (`summarize`, `translate`).
pub const FIELD_ACTION: &str = "action";
