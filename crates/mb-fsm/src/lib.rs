//! Pure state-machine rules for a meeting's lifecycle. No I/O, no async —
//! every other crate in this workspace builds on top of this one.

pub mod status;

pub use status::{CompletionReason, FailureStage, Status, TransitionSource, ACTIVE_SET};
