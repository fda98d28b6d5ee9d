use std::time::Duration;

use thiserror::Error;

/// Failure while talking to the platform permission subsystem.
/// Never fatal: the gate logs it and still reports "checked".
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("failed to query location permission: {0}")]
    Query(String),
    #[error("failed to request location permission: {0}")]
    Request(String),
}

/// Why a geolocation provider could not produce a fix.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationFailure {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("no fix within {0:?}")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

/// Single outcome callers see for every geolocation failure mode.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("location unavailable: {cause}")]
pub struct LocationUnavailable {
    pub cause: LocationFailure,
}

impl From<LocationFailure> for LocationUnavailable {
    fn from(cause: LocationFailure) -> Self {
        Self { cause }
    }
}

/// Per-report delivery failure. Leaves that report queued.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmissionFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("server rejected report with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("stored report queue is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("failed to read report queue: {0:#}")]
    Read(anyhow::Error),
    #[error("failed to write report queue: {0:#}")]
    Write(anyhow::Error),
    #[error("failed to encode report queue: {0}")]
    Encode(#[source] serde_json::Error),
}
