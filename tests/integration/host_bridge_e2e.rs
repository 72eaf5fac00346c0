//! Host command channel driven end to end: commands in, envelopes out.

use std::sync::Arc;

use parlance::ChatConfig;
use parlance::capability::CapabilityProvider;
use parlance::host::channel::{HostCommandClient, command_channel};
use parlance::host::contract::{CommandEnvelope, CommandName, EventEnvelope, event_names};
use parlance::orchestrator::Orchestrator;
use serde_json::json;
use tokio::sync::broadcast;

use crate::helpers::{ScriptedFeature, ScriptedProvider, english_paragraph, next_event_where};

fn start(provider: ScriptedProvider) -> (HostCommandClient, broadcast::Receiver<EventEnvelope>) {
    let orchestrator = Orchestrator::new(
        Arc::new(provider) as Arc<dyn CapabilityProvider>,
        ChatConfig::default(),
    );
    let (client, server) = command_channel(8, 64, orchestrator);
    let events = client.subscribe_events();
    tokio::spawn(server.run());
    (client, events)
}

fn command(id: &str, name: CommandName, payload: serde_json::Value) -> CommandEnvelope {
    CommandEnvelope::new(id, name, payload)
}

#[tokio::test]
async fn submit_detect_summarize_over_the_channel() {
    let (client, mut events) = start(
        ScriptedProvider::detecting("en")
            .with_summarizer(ScriptedFeature::ready("Summary text".to_owned())),
    );

    let resp = client
        .send(command(
            "r1",
            CommandName::ConversationSubmit,
            json!({"text": english_paragraph()}),
        ))
        .await
        .unwrap();
    assert!(resp.ok);
    let message_id = resp.payload["message_id"].as_str().unwrap().to_owned();

    let affordance = next_event_where(&mut events, |e| {
        e.event == event_names::SUMMARIZE_AFFORDANCE && e.payload["state"] != "detecting"
    })
    .await;
    assert_eq!(affordance.payload["message_id"], message_id.as_str());
    assert_eq!(affordance.payload["enabled"], true);

    let resp = client
        .send(command(
            "r2",
            CommandName::ConversationSummarize,
            json!({"message_id": message_id}),
        ))
        .await
        .unwrap();
    assert!(resp.ok);
    assert_eq!(resp.payload["accepted"], true);

    let composing = next_event_where(&mut events, |e| e.event == event_names::COMPOSING_CHANGED)
        .await;
    assert_eq!(composing.payload["composing"], true);

    let messages = next_event_where(&mut events, |e| e.event == event_names::MESSAGES_CHANGED)
        .await;
    let log = messages.payload["messages"].as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1]["content"], "Summary text");
    assert_eq!(log[1]["role"], "assistant");

    let composing = next_event_where(&mut events, |e| e.event == event_names::COMPOSING_CHANGED)
        .await;
    assert_eq!(composing.payload["composing"], false);

    let snapshot = client
        .send(command("r3", CommandName::ConversationSnapshot, json!({})))
        .await
        .unwrap();
    assert_eq!(snapshot.payload["messages"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot.payload["composing"], false);
}

#[tokio::test]
async fn unavailable_translation_emits_notification_event() {
    let (client, mut events) = start(
        ScriptedProvider::detecting("en").with_translator(ScriptedFeature::unavailable(
            parlance::capability::FeatureKind::Translation,
        )),
    );

    let resp = client
        .send(command(
            "r1",
            CommandName::ConversationSubmit,
            json!({"text": "Hello there"}),
        ))
        .await
        .unwrap();
    let message_id = resp.payload["message_id"].as_str().unwrap().to_owned();

    let resp = client
        .send(command(
            "r2",
            CommandName::ConversationTranslate,
            json!({"message_id": message_id, "language": "es"}),
        ))
        .await
        .unwrap();
    assert!(resp.ok);

    let notify = next_event_where(&mut events, |e| e.event == event_names::NOTIFY).await;
    assert_eq!(notify.payload["text"], "The translator isn't usable");
}

#[tokio::test]
async fn routing_errors_come_back_as_error_responses() {
    let (client, _events) = start(ScriptedProvider::default());

    let resp = client
        .send(command(
            "bad-1",
            CommandName::ConversationSummarize,
            json!({"message_id": "msg-unknown"}),
        ))
        .await
        .unwrap();
    assert!(!resp.ok);
    assert_eq!(resp.request_id, "bad-1");
    assert_eq!(resp.error.as_deref(), Some("unknown message: msg-unknown"));
}

#[tokio::test]
async fn invalid_envelope_is_rejected_client_side() {
    let (client, _events) = start(ScriptedProvider::default());
    let mut envelope = command("r1", CommandName::HostPing, json!({}));
    envelope.v = 99;
    assert!(client.send(envelope).await.is_err());
}

#[tokio::test]
async fn capability_status_reflects_the_scripted_provider() {
    let (client, _events) = start(
        ScriptedProvider::detecting("en").with_translator(ScriptedFeature::unavailable(
            parlance::capability::FeatureKind::Translation,
        )),
    );
    let resp = client
        .send(command("r1", CommandName::CapabilityStatus, json!({})))
        .await
        .unwrap();
    assert_eq!(resp.payload["provider"], "scripted");
    assert_eq!(resp.payload["features"]["detection"], "readily");
    assert_eq!(resp.payload["features"]["summarization"], "absent");
    assert_eq!(resp.payload["features"]["translation"], "no");
}
