use proptest::prelude::*;

use hemoscan_core::models::ValidationState;
use hemoscan_core::state_machine::StageSnapshot;

/// Strategy for classification labels the classifier produces
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Circular".to_string()),
        Just("Elongated".to_string()),
        Just("Other".to_string()),
        "[A-Z][a-z]{2,12}".prop_filter("Not the select placeholder", |s| s != "Select"),
    ]
}

/// Strategy for the unset spellings stored by the framework
pub fn unset_strategy() -> impl Strategy<Value = ValidationState> {
    prop_oneof![
        Just(ValidationState::from(None)),
        Just(ValidationState::from("")),
        Just(ValidationState::from("Select")),
    ]
}

pub fn validated_states_strategy(max: usize) -> impl Strategy<Value = Vec<ValidationState>> {
    prop::collection::vec(label_strategy().prop_map(ValidationState::label), 1..=max)
}

/// Validated cells with one unset cell inserted at an arbitrary position
pub fn states_with_one_unset_strategy() -> impl Strategy<Value = Vec<ValidationState>> {
    (validated_states_strategy(40), unset_strategy(), any::<prop::sample::Index>()).prop_map(
        |(mut states, unset, index)| {
            let position = index.index(states.len() + 1);
            states.insert(position, unset);
            states
        },
    )
}

/// Any snapshot at all
pub fn snapshot_strategy() -> impl Strategy<Value = StageSnapshot> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec(
            prop_oneof![
                unset_strategy(),
                label_strategy().prop_map(ValidationState::label)
            ],
            0..20,
        ),
        any::<bool>(),
    )
        .prop_map(
            |(submitted, has_detection_image, validation_states, has_report)| StageSnapshot {
                submitted,
                has_detection_image,
                validation_states,
                has_report,
            },
        )
}
