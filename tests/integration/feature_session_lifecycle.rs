//! Feature session lifecycle against scripted provider behaviour.

use std::sync::{Arc, Mutex};

use parlance::capability::{
    CapabilityError, CapabilityProvider, DownloadProgress, FeatureKind, ProvisionEvent,
    Summarization, SummarizerOptions, Translation, TranslatorOptions,
};
use parlance::{FeatureSession, ProgressCallback, ProgressEvent, SessionState};

use crate::helpers::{ScriptedFeature, ScriptedProvider};

fn recorder() -> (Arc<Mutex<Vec<ProgressEvent>>>, ProgressCallback) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, Box::new(move |e| sink.lock().unwrap().push(e)))
}

fn states(events: &[ProgressEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn summarizer(
    feature: ScriptedFeature<String>,
) -> (Arc<ScriptedProvider>, Arc<dyn CapabilityProvider>) {
    let provider = Arc::new(ScriptedProvider::default().with_summarizer(feature));
    let gateway: Arc<dyn CapabilityProvider> = Arc::clone(&provider) as Arc<dyn CapabilityProvider>;
    (provider, gateway)
}

#[tokio::test]
async fn stream_ending_without_ready_is_provisioning_failure() {
    let (provider, gateway) = summarizer(ScriptedFeature::after_download(
        vec![ProvisionEvent::Progress(DownloadProgress::new(10, 100))],
        "never".to_owned(),
    ));
    let (events, callback) = recorder();

    let err = FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .with_progress(callback)
        .run("text")
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PROVISIONING_FAILED");
    assert_eq!(states(&events.lock().unwrap()).last(), Some(&SessionState::Failed));
    assert!(provider.summarizer.as_ref().unwrap().invocations().is_empty());
}

#[tokio::test]
async fn non_monotonic_progress_is_forwarded_and_tolerated() {
    let (_provider, gateway) = summarizer(ScriptedFeature::after_download(
        vec![
            ProvisionEvent::Progress(DownloadProgress::new(60, 100)),
            ProvisionEvent::Progress(DownloadProgress::new(40, 100)),
            ProvisionEvent::Progress(DownloadProgress::new(100, 100)),
            ProvisionEvent::Ready,
        ],
        "done".to_owned(),
    ));
    let (events, callback) = recorder();

    let output = FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .with_progress(callback)
        .run("text")
        .await
        .unwrap();
    assert_eq!(output, "done");

    let forwarded: Vec<u64> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::DownloadProgress { progress, .. } => Some(progress.loaded),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded, [60, 40, 100]);
}

#[tokio::test]
async fn provisioning_wait_happens_once_and_stops_at_ready() {
    let (_provider, gateway) = summarizer(ScriptedFeature::after_download(
        vec![
            ProvisionEvent::Progress(DownloadProgress::new(100, 100)),
            ProvisionEvent::Ready,
            ProvisionEvent::Progress(DownloadProgress::new(100, 100)),
            ProvisionEvent::Ready,
        ],
        "ok".to_owned(),
    ));
    let (events, callback) = recorder();

    FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .with_progress(callback)
        .run("text")
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let ready = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::ProvisioningReady { .. }))
        .count();
    let progress = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::DownloadProgress { .. }))
        .count();
    assert_eq!(ready, 1);
    assert_eq!(progress, 1);
    assert_eq!(
        states(&events),
        [
            SessionState::Probing,
            SessionState::Provisioning,
            SessionState::Provisioned,
            SessionState::Invoking,
            SessionState::Completed,
        ]
    );
}

#[tokio::test]
async fn readily_probe_with_pending_instance_still_waits() {
    let (provider, gateway) = summarizer(
        ScriptedFeature::ready("fresh".to_owned())
            .with_provisioning(vec![ProvisionEvent::Failed("disk full".to_owned())]),
    );

    let err = FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .run("text")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CapabilityError::provisioning(FeatureKind::Summarization, "disk full")
    );
    assert!(provider.summarizer.as_ref().unwrap().invocations().is_empty());
}

#[tokio::test]
async fn probe_error_is_classified_as_provisioning_failure() {
    let (_provider, gateway) = summarizer(ScriptedFeature::probe_error(
        CapabilityError::invocation(FeatureKind::Summarization, "runtime crashed"),
    ));
    let (events, callback) = recorder();

    let err = FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .with_progress(callback)
        .run("text")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROVISIONING_FAILED");
    assert_eq!(err.message(), "runtime crashed");
    assert_eq!(
        states(&events.lock().unwrap()),
        [SessionState::Probing, SessionState::Failed]
    );
}

#[tokio::test]
async fn create_error_fails_the_session() {
    let (_provider, gateway) = summarizer(
        ScriptedFeature::ready("x".to_owned()).with_create_error(CapabilityError::provisioning(
            FeatureKind::Summarization,
            "quota exceeded",
        )),
    );
    let err = FeatureSession::<Summarization>::new(gateway, SummarizerOptions::default())
        .run("text")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROVISIONING_FAILED");
    assert_eq!(err.message(), "quota exceeded");
}

#[tokio::test]
async fn unsupported_classification_is_stable_across_attempts() {
    let gateway: Arc<dyn CapabilityProvider> = Arc::new(ScriptedProvider::default());
    let unavailable: Arc<dyn CapabilityProvider> = Arc::new(
        ScriptedProvider::default()
            .with_translator(ScriptedFeature::unavailable(FeatureKind::Translation)),
    );

    for _ in 0..3 {
        let absent = FeatureSession::<Translation>::new(
            Arc::clone(&gateway),
            TranslatorOptions::new("en", "fr"),
        )
        .run("Hello")
        .await
        .unwrap_err();
        assert_eq!(absent.code(), "CAPABILITY_ABSENT");

        let refused = FeatureSession::<Translation>::new(
            Arc::clone(&unavailable),
            TranslatorOptions::new("en", "fr"),
        )
        .run("Hello")
        .await
        .unwrap_err();
        assert_eq!(refused.code(), "CAPABILITY_UNAVAILABLE");
        assert!(refused.is_unsupported());
    }
}
