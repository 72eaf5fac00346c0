//! Shared helpers for integration tests.
//!
//! [`ScriptedProvider`] is a `CapabilityProvider` whose probe answers,
//! provisioning events and outputs are fixed up front, and which records
//! every create and invoke call.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parlance::capability::{
    CapabilityAvailability, CapabilityError, CapabilityProvider, Created, Detection, Feature,
    FeatureInstance, FeatureProvider, LanguageDetection, ProvisionEvent, Summarization,
    Translation,
};
use parlance::host::contract::EventEnvelope;
use parlance::{ChatConfig, ChatEvent, MessageId, Orchestrator};
use tokio::sync::broadcast;

/// An English paragraph of exactly 200 characters.
pub(crate) fn english_paragraph() -> String {
    let base = "The quarterly report shows that the team has made steady progress on the new \
        release, and the remaining work is well understood by everyone who is involved in it. \
        We expect to ship it on time.";
    let mut text: String = base.chars().take(200).collect();
    while text.chars().count() < 200 {
        text.push('.');
    }
    text
}

/// One scripted feature family.
pub(crate) struct ScriptedFeature<O> {
    probe: Result<CapabilityAvailability, CapabilityError>,
    create_error: Option<CapabilityError>,
    provisioning: Option<Vec<ProvisionEvent>>,
    output: Result<O, CapabilityError>,
    created_with: Mutex<Vec<String>>,
    inputs: Arc<Mutex<Vec<String>>>,
}

impl<O> ScriptedFeature<O> {
    fn with(
        probe: Result<CapabilityAvailability, CapabilityError>,
        output: Result<O, CapabilityError>,
    ) -> Self {
        Self {
            probe,
            create_error: None,
            provisioning: None,
            output,
            created_with: Mutex::new(Vec::new()),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Immediately usable, returns `output`.
    pub(crate) fn ready(output: O) -> Self {
        Self::with(Ok(CapabilityAvailability::Readily), Ok(output))
    }

    /// Probe answers "no".
    pub(crate) fn unavailable(feature: parlance::capability::FeatureKind) -> Self {
        Self::with(
            Ok(CapabilityAvailability::Unavailable),
            Err(CapabilityError::invocation(feature, "must not be invoked")),
        )
    }

    /// Usable after the given provisioning events.
    pub(crate) fn after_download(events: Vec<ProvisionEvent>, output: O) -> Self {
        let mut feature = Self::with(Ok(CapabilityAvailability::AfterDownload), Ok(output));
        feature.provisioning = Some(events);
        feature
    }

    /// Immediately usable, but every call fails with `err`.
    pub(crate) fn failing(err: CapabilityError) -> Self {
        Self::with(Ok(CapabilityAvailability::Readily), Err(err))
    }

    /// Probe itself raises `err`.
    pub(crate) fn probe_error(err: CapabilityError) -> Self {
        let output = Err(err.clone());
        Self::with(Err(err), output)
    }

    /// Override the provisioning events regardless of the probe answer.
    pub(crate) fn with_provisioning(mut self, events: Vec<ProvisionEvent>) -> Self {
        self.provisioning = Some(events);
        self
    }

    pub(crate) fn with_create_error(mut self, err: CapabilityError) -> Self {
        self.create_error = Some(err);
        self
    }

    pub(crate) fn invocations(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    /// Debug renderings of the options every `create` call received.
    pub(crate) fn created_with(&self) -> Vec<String> {
        self.created_with.lock().unwrap().clone()
    }
}

struct ScriptedInstance<O> {
    output: Result<O, CapabilityError>,
    inputs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl<F> FeatureProvider<F> for ScriptedFeature<F::Output>
where
    F: Feature,
    F::Output: Clone + Sync,
{
    async fn availability(&self) -> Result<CapabilityAvailability, CapabilityError> {
        self.probe.clone()
    }

    async fn create(&self, options: &F::Options) -> Result<Created<F>, CapabilityError> {
        self.created_with.lock().unwrap().push(format!("{options:?}"));
        if let Some(err) = &self.create_error {
            return Err(err.clone());
        }
        let instance = ScriptedInstance {
            output: self.output.clone(),
            inputs: Arc::clone(&self.inputs),
        };
        Ok(match &self.provisioning {
            Some(events) => Created::pending(
                instance,
                Box::pin(futures_util::stream::iter(events.clone())),
            ),
            None => Created::ready(instance),
        })
    }
}

#[async_trait]
impl<F> FeatureInstance<F> for ScriptedInstance<F::Output>
where
    F: Feature,
    F::Output: Clone + Sync,
{
    async fn invoke(&self, input: &str) -> Result<F::Output, CapabilityError> {
        self.inputs.lock().unwrap().push(input.to_owned());
        self.output.clone()
    }
}

/// A provider assembled from optional scripted features (`None` = absent).
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    pub detector: Option<Arc<ScriptedFeature<Vec<LanguageDetection>>>>,
    pub summarizer: Option<Arc<ScriptedFeature<String>>>,
    pub translator: Option<Arc<ScriptedFeature<String>>>,
}

impl ScriptedProvider {
    /// Detector reporting `language` at high confidence; other features absent.
    pub(crate) fn detecting(language: &str) -> Self {
        Self {
            detector: Some(Arc::new(ScriptedFeature::ready(vec![
                LanguageDetection::new(language, 0.97),
                LanguageDetection::new("und", 0.03),
            ]))),
            ..Self::default()
        }
    }

    pub(crate) fn with_summarizer(mut self, feature: ScriptedFeature<String>) -> Self {
        self.summarizer = Some(Arc::new(feature));
        self
    }

    pub(crate) fn with_translator(mut self, feature: ScriptedFeature<String>) -> Self {
        self.translator = Some(Arc::new(feature));
        self
    }
}

impl CapabilityProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn language_detector(&self) -> Option<Arc<dyn FeatureProvider<Detection>>> {
        self.detector
            .clone()
            .map(|f| f as Arc<dyn FeatureProvider<Detection>>)
    }

    fn summarizer(&self) -> Option<Arc<dyn FeatureProvider<Summarization>>> {
        self.summarizer
            .clone()
            .map(|f| f as Arc<dyn FeatureProvider<Summarization>>)
    }

    fn translator(&self) -> Option<Arc<dyn FeatureProvider<Translation>>> {
        self.translator
            .clone()
            .map(|f| f as Arc<dyn FeatureProvider<Translation>>)
    }
}

/// Build an orchestrator over `provider` with default config.
pub(crate) fn orchestrator(provider: ScriptedProvider) -> (Orchestrator, Arc<ScriptedProvider>) {
    orchestrator_with(provider, ChatConfig::default())
}

pub(crate) fn orchestrator_with(
    provider: ScriptedProvider,
    config: ChatConfig,
) -> (Orchestrator, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let orchestrator =
        Orchestrator::new(Arc::clone(&provider) as Arc<dyn CapabilityProvider>, config);
    (orchestrator, provider)
}

/// Submit `text` and wait for its detection task to finish.
pub(crate) async fn submit_and_detect(orchestrator: &Orchestrator, text: &str) -> MessageId {
    let submitted = orchestrator.submit_message(text).expect("non-empty submission");
    if let Some(task) = submitted.detection {
        task.await.expect("detection task");
    }
    submitted.message_id
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

pub(crate) fn notifications(events: &[ChatEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Notify { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn composing_changes(events: &[ChatEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::ComposingChanged { composing } => Some(*composing),
            _ => None,
        })
        .collect()
}

/// Wait (up to five seconds) for the next host event matching `pred`.
pub(crate) async fn next_event_where(
    rx: &mut broadcast::Receiver<EventEnvelope>,
    pred: impl Fn(&EventEnvelope) -> bool,
) -> EventEnvelope {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for host event")
}
