use async_trait::async_trait;

use crate::{error::LocationFailure, models::Coordinates};

use super::LocationOptions;

/// Device geolocation capability.
///
/// Implementations may ignore options they cannot honour. They must not
/// invent a position: when no fix is available they return an error.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, opts: &LocationOptions)
        -> Result<Coordinates, LocationFailure>;
}

/// Reports a position supplied up front (e.g. from the command line), or
/// "unavailable" when none was given.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationProvider {
    position: Option<Coordinates>,
}

impl StaticLocationProvider {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_position(
        &self,
        _opts: &LocationOptions,
    ) -> Result<Coordinates, LocationFailure> {
        self.position.ok_or_else(|| {
            LocationFailure::PositionUnavailable("no position source on this device".into())
        })
    }
}
