//! Configuration files driving orchestrator behaviour.

use parlance::capability::simulated::SimulatedAvailability;
use parlance::{AffordanceState, ChatConfig, ChatError};

use crate::helpers::{ScriptedProvider, orchestrator_with, submit_and_detect};

#[test]
fn toml_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parlance").join("config.toml");

    let mut config = ChatConfig::default();
    config.detection.min_summarize_chars = 20;
    config.simulation.translator.availability = SimulatedAvailability::AfterDownload;
    config.simulation.translator.download_steps = 3;
    config.save_to_file(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("[detection]"));
    assert!(raw.contains("min_summarize_chars = 20"));
    assert!(raw.contains("after-download"));

    let loaded = ChatConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn invalid_values_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[orchestrator]\nevent_capacity = 0\n").unwrap();

    let config = ChatConfig::from_file(&path).unwrap();
    assert!(matches!(config.validate(), Err(ChatError::Config(_))));
}

#[tokio::test]
async fn configured_threshold_changes_the_affordance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[detection]\nmin_summarize_chars = 5\n").unwrap();
    let config = ChatConfig::from_file(&path).unwrap();

    let (orch, _provider) = orchestrator_with(ScriptedProvider::detecting("en"), config);
    let id = submit_and_detect(&orch, "Hello there").await;
    assert_eq!(orch.affordance(&id), Some(AffordanceState::Enabled));
}

#[tokio::test]
async fn configured_language_changes_the_affordance() {
    let mut config = ChatConfig::default();
    config.detection.summarize_language = "fr".to_owned();
    config.detection.min_summarize_chars = 0;

    let (orch, _provider) = orchestrator_with(ScriptedProvider::detecting("fr-CA"), config);
    let id = submit_and_detect(&orch, "Bonjour").await;
    assert_eq!(orch.affordance(&id), Some(AffordanceState::Enabled));
}
