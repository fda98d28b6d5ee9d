use async_trait::async_trait;
use serde::Serialize;

use crate::error::PermissionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; asking will show a prompt.
    Prompt,
}

/// Platform location-permission subsystem.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Whether this platform gates location behind an explicit grant.
    fn requires_prompt(&self) -> bool;

    async fn check(&self) -> Result<PermissionState, PermissionError>;

    async fn request(&self) -> Result<PermissionState, PermissionError>;
}

/// Platforms where location access needs no runtime grant (desktop, web).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPromptPlatform;

#[async_trait]
impl PermissionProvider for NoPromptPlatform {
    fn requires_prompt(&self) -> bool {
        false
    }

    async fn check(&self) -> Result<PermissionState, PermissionError> {
        Ok(PermissionState::Granted)
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        Ok(PermissionState::Granted)
    }
}
