//! Drives a blood smear through every stage against the in-memory framework.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use hemoscan_core::config::ClassificationMode;
use hemoscan_core::events::ClassificationWatcher;
use hemoscan_core::orchestration::StageResolver;
use hemoscan_core::state_machine::ActionKind;
use hemoscan_core::test_helpers::{test_config, InMemoryFramework};

async fn run_to_completion(harness: &Harness) -> Vec<ActionKind> {
    let resolver = StageResolver::new(harness.framework.clone());
    let mut performed = Vec::new();

    loop {
        let resolution = resolver.resolve(SMEAR).await.unwrap();
        let Some(target) = resolution.target().map(str::to_string) else {
            break;
        };
        harness
            .invoker
            .invoke(resolution.action, &target, &session())
            .await
            .unwrap();
        performed.push(resolution.action);
        assert!(performed.len() <= 4, "workflow did not converge: {performed:?}");
    }

    let resolution = resolver.resolve(SMEAR).await.unwrap();
    assert_eq!(resolution.actions(), vec![ActionKind::Approve]);
    let report = resolution
        .target_of(ActionKind::Approve)
        .unwrap()
        .to_string();
    harness
        .invoker
        .invoke(ActionKind::Approve, &report, &session())
        .await
        .unwrap();
    performed.push(ActionKind::Approve);

    let resolution = resolver.resolve(SMEAR).await.unwrap();
    assert!(resolution.actions().is_empty());
    performed
}

#[tokio::test]
async fn test_queued_workflow_runs_every_stage_once() {
    let framework = InMemoryFramework::new().with_extraction_count(5);
    submitted_smear(&framework);
    let (harness, _publisher) = queued_harness(framework, &test_config());

    let performed = run_to_completion(&harness).await;

    assert_eq!(
        performed,
        vec![
            ActionKind::Detect,
            ActionKind::Extract,
            ActionKind::Classify,
            ActionKind::GenerateReport,
            ActionKind::Approve,
        ]
    );
    assert_eq!(harness.framework.executed_named("enqueue_classification").len(), 1);
    assert!(harness.framework.executed_named("classify_image").is_empty());
}

#[tokio::test]
async fn test_per_record_workflow_runs_every_stage_once() {
    let framework = InMemoryFramework::new().with_extraction_count(7);
    submitted_smear(&framework);
    let mut config = test_config();
    config.classification.mode = ClassificationMode::PerRecord;
    let harness = Harness::with_config(framework, &config);

    let performed = run_to_completion(&harness).await;

    assert_eq!(performed.len(), 5);
    assert_eq!(harness.framework.executed_named("classify_image").len(), 7);
}

#[tokio::test]
async fn test_watcher_completes_queued_classification() {
    let framework = InMemoryFramework::new();
    smear_with_cells(&framework, &["", ""]);
    framework.complete_queued_classification(false);
    let (harness, publisher) = queued_harness(framework, &test_config());

    let watcher = ClassificationWatcher::new(
        harness.framework.clone(),
        publisher,
        Duration::from_millis(10),
    )
    .spawn(DETECTION);

    // Server-side classification finishing some time after the enqueue
    let framework: Arc<InMemoryFramework> = harness.framework.clone();
    let classifier = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        for cell in framework.cells_of(DETECTION) {
            framework.set_validation(&cell.name, "Other".into());
        }
    });

    let outcome = harness
        .invoker
        .invoke(ActionKind::Classify, DETECTION, &session())
        .await
        .unwrap();
    classifier.await.unwrap();
    watcher.await.unwrap().unwrap();

    assert!(outcome.route.is_some());
    let resolution = StageResolver::new(harness.framework.clone())
        .resolve(SMEAR)
        .await
        .unwrap();
    assert_eq!(resolution.action, ActionKind::GenerateReport);
}
