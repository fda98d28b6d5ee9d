use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{location::LocationOptions, models::Coordinates, queue::QUEUE_KEY};

pub const API_BASE_URL_ENV: &str = "RESQ_API_BASE_URL";
pub const DATA_DIR_ENV: &str = "RESQ_DATA_DIR";
pub const DEBUG_ENV: &str = "RESQ_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub interactive_location: LocationOptions,
    pub background_location: LocationOptions,
    /// Used when a report has to be queued without any fix.
    pub fallback_position: Coordinates,
    pub queue_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://appresqforce.onrender.com".into(),
            request_timeout_ms: 20_000,
            probe_interval_ms: 15_000,
            interactive_location: LocationOptions::interactive(),
            background_location: LocationOptions::background(),
            fallback_position: Coordinates::new(20.5937, 78.9629),
            queue_key: QUEUE_KEY.into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
    }
}

/// Fields the `config set` command can change. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub api_base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub probe_interval_ms: Option<u64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(url) = self.api_base_url {
            settings.api_base_url = url;
        }
        if let Some(timeout_ms) = self.request_timeout_ms {
            settings.request_timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = self.probe_interval_ms {
            settings.probe_interval_ms = interval_ms;
        }
    }
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// `settings.json` in the data directory. Unreadable content falls back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring invalid settings in {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored settings with environment overrides applied.
    pub fn effective(&self) -> Settings {
        let mut settings = self.read().clone();
        settings.apply_env_overrides();
        settings
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Applies `patch` to the stored settings (not the env-overridden view)
    /// and persists the result.
    pub fn apply_patch(&self, patch: SettingsPatch) -> Result<Settings> {
        if patch.api_base_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            bail!("API base URL must not be empty");
        }

        let mut settings = self.read().clone();
        patch.apply(&mut settings);
        self.update(settings.clone())?;
        Ok(settings)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
