use serde::{Deserialize, Serialize};
use specta::Type;

/// Outcome of applying one verified webhook event to the intent store.
///
/// `AlreadyApplied` and `Unhandled` are normal idempotent results, not
/// errors. `ConflictingState` is surfaced for manual reconciliation and is
/// never auto-corrected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Applied,
    AlreadyApplied,
    ConflictingState,
    Recorded,
    Unhandled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub intent_id: Option<String>,
    pub outcome: DispatchOutcome,
    pub received_at: String,
}
