use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};
use thiserror::Error;

use crate::pagination::DEFAULT_PAGE_SIZE;

/// Overrides `highlight_duration_ms` for the running engine.
pub const HIGHLIGHT_ENV_VAR: &str = "LABELREVIEW_HIGHLIGHT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSettings {
    #[error("page_size must be at least 1")]
    ZeroPageSize,
    #[error("highlight_duration_ms must be at least 1")]
    ZeroHighlightDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewSettings {
    pub page_size: usize,
    pub highlight_duration_ms: u64,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            highlight_duration_ms: 2000,
        }
    }
}

impl ReviewSettings {
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        if self.page_size == 0 {
            return Err(InvalidSettings::ZeroPageSize);
        }
        if self.highlight_duration_ms == 0 {
            return Err(InvalidSettings::ZeroHighlightDuration);
        }
        Ok(())
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_duration_ms)
    }

    /// Apply the environment override, if set and parseable.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(HIGHLIGHT_ENV_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.highlight_duration_ms = ms,
                _ => warn!("Ignoring {HIGHLIGHT_ENV_VAR}={raw}"),
            }
        }
        self
    }

    fn sanitized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.highlight_duration_ms = self.highlight_duration_ms.max(1);
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ReviewSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            parse_or_default(&contents, &path)
        } else {
            ReviewSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn review(&self) -> ReviewSettings {
        self.read().clone()
    }

    pub fn update_review(&self, settings: ReviewSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ReviewSettings = serde_json::from_str(&contents)?;
        *self.write() = data.sanitized();
        Ok(())
    }

    fn persist(&self, data: &ReviewSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ReviewSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ReviewSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn parse_or_default(contents: &str, path: &Path) -> ReviewSettings {
    match serde_json::from_str::<ReviewSettings>(contents) {
        Ok(settings) => settings.sanitized(),
        Err(err) => {
            warn!(
                "Settings at {} are unreadable ({err}); using defaults",
                path.display()
            );
            ReviewSettings::default()
        }
    }
}
