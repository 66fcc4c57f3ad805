// State machine module for the blood smear workflow
//
// The workflow exposes exactly one action per stage. `resolver` holds the pure
// policy; the orchestration layer feeds it snapshots read from the document store.

pub mod resolver;
pub mod states;

pub use resolver::{approval_available, resolve, StageSnapshot};
pub use states::ActionKind;
