mod common;

use std::sync::Arc;

use common::*;
use hemoscan_core::error::WorkflowError;
use hemoscan_core::models::{BloodSmearImage, DocStatus};
use hemoscan_core::orchestration::StageResolver;
use hemoscan_core::state_machine::ActionKind;
use hemoscan_core::test_helpers::InMemoryFramework;

async fn resolve_action(framework: InMemoryFramework) -> ActionKind {
    StageResolver::new(Arc::new(framework))
        .resolve(SMEAR)
        .await
        .unwrap()
        .action
}

#[tokio::test]
async fn test_submitted_smear_without_detection_selects_detect() {
    let framework = InMemoryFramework::new();
    submitted_smear(&framework);
    assert_eq!(resolve_action(framework).await, ActionKind::Detect);
}

#[tokio::test]
async fn test_cancelled_smear_offers_nothing() {
    let framework = InMemoryFramework::new();
    framework.insert_smear(BloodSmearImage::new(SMEAR, DocStatus::Cancelled));
    assert_eq!(resolve_action(framework).await, ActionKind::None);
}

#[tokio::test]
async fn test_zero_cells_selects_extract() {
    let framework = InMemoryFramework::new();
    smear_with_cells(&framework, &[]);
    assert_eq!(resolve_action(framework).await, ActionKind::Extract);
}

#[tokio::test]
async fn test_trailing_select_cell_selects_classify() {
    let framework = InMemoryFramework::new();
    smear_with_cells(&framework, &["Circular", "Elongated", "Select"]);
    assert_eq!(resolve_action(framework).await, ActionKind::Classify);
}

#[tokio::test]
async fn test_all_validated_without_report_selects_generate_report() {
    let framework = InMemoryFramework::new();
    smear_with_cells(&framework, &["Circular", "Elongated", "Other"]);
    assert_eq!(resolve_action(framework).await, ActionKind::GenerateReport);
}

#[tokio::test]
async fn test_completed_stages_offer_only_approval() {
    let framework = Arc::new(InMemoryFramework::new());
    smear_with_cells(&framework, &["Circular"]);
    pending_report(&framework, "Pending Approval");

    let resolver = StageResolver::new(framework.clone());
    let resolution = resolver.resolve(SMEAR).await.unwrap();
    assert_eq!(resolution.action, ActionKind::None);
    assert!(resolution.approval_available);
    assert_eq!(resolution.actions(), vec![ActionKind::Approve]);
    assert_eq!(resolution.next_action(), ActionKind::Approve);
    assert_eq!(resolution.target_of(resolution.next_action()), Some(REPORT));

    let mut approved = framework.report(REPORT).unwrap();
    approved.approved_by = Some("someone@example.com".to_string());
    framework.insert_report(approved);

    let resolution = resolver.resolve(SMEAR).await.unwrap();
    assert!(!resolution.approval_available);
    assert!(resolution.actions().is_empty());
    assert_eq!(resolution.next_action(), ActionKind::None);
}

#[tokio::test]
async fn test_store_outage_yields_retryable_query_error() {
    let framework = InMemoryFramework::new();
    submitted_smear(&framework);
    framework.set_store_unavailable(true);

    let error = StageResolver::new(Arc::new(framework))
        .resolve(SMEAR)
        .await
        .unwrap_err();
    match &error {
        WorkflowError::Query { source, .. } => assert!(source.is_recoverable()),
        other => panic!("expected query error, got {other:?}"),
    }
    assert!(error.user_message().contains("Please try again"));
}
