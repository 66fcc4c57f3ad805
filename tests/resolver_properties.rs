mod common;

use common::strategies::*;
use hemoscan_core::state_machine::{resolve, ActionKind, StageSnapshot};
use proptest::prelude::*;

proptest! {
    /// Property: one unset cell anywhere, even last, forces Classify
    #[test]
    fn any_unset_cell_selects_classify(states in states_with_one_unset_strategy(), has_report in any::<bool>()) {
        let snapshot = StageSnapshot {
            submitted: true,
            has_detection_image: true,
            validation_states: states,
            has_report,
        };
        prop_assert_eq!(resolve(&snapshot), ActionKind::Classify);
    }

    /// Property: fully validated cells without a report select GenerateReport
    #[test]
    fn validated_cells_without_report_select_generate_report(states in validated_states_strategy(40)) {
        let snapshot = StageSnapshot {
            submitted: true,
            has_detection_image: true,
            validation_states: states,
            has_report: false,
        };
        prop_assert_eq!(resolve(&snapshot), ActionKind::GenerateReport);
    }

    /// Property: unsubmitted documents never offer an action
    #[test]
    fn unsubmitted_documents_offer_nothing(snapshot in snapshot_strategy()) {
        let snapshot = StageSnapshot { submitted: false, ..snapshot };
        prop_assert_eq!(resolve(&snapshot), ActionKind::None);
    }

    /// Property: the resolver never offers Approve
    #[test]
    fn resolver_never_offers_approve(snapshot in snapshot_strategy()) {
        prop_assert_ne!(resolve(&snapshot), ActionKind::Approve);
    }

    /// Property: resolution depends only on the set of states, not their order
    #[test]
    fn resolution_ignores_cell_order(snapshot in snapshot_strategy()) {
        let mut reversed = snapshot.clone();
        reversed.validation_states.reverse();
        prop_assert_eq!(resolve(&snapshot), resolve(&reversed));
    }
}

#[test]
fn zero_cells_select_extract_only() {
    let snapshot = StageSnapshot {
        submitted: true,
        has_detection_image: true,
        validation_states: Vec::new(),
        has_report: true,
    };
    assert_eq!(resolve(&snapshot), ActionKind::Extract);
}
