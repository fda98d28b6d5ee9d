use std::fmt;

use serde::Serialize;

/// What started a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerSource {
    Startup,
    Reconnect,
    Manual,
    /// Re-run requested by a trigger that arrived while a pass was in flight.
    FollowUp,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TriggerSource::Startup => "startup",
            TriggerSource::Reconnect => "reconnect",
            TriggerSource::Manual => "manual",
            TriggerSource::FollowUp => "follow-up",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Offline,
    EmptyQueue,
    /// Stored queue was unreadable and has been discarded.
    CorruptQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub attempted: usize,
    pub sent: usize,
    /// Reports from this batch that stay queued.
    pub retained: usize,
    pub location_refreshed: bool,
    /// False when the final queue write failed; storage still holds the old batch.
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum PassOutcome {
    Skipped { reason: SkipReason },
    Completed(PassSummary),
    /// Another pass was running; this trigger was folded into a follow-up pass.
    Coalesced,
}
