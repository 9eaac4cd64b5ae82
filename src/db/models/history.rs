//! History log data models.
//!
//! - `HistoryEntry`: one completed or failed validate/translate action
//! - `ActionType`, `HistoryStatus`: stored as lowercase text

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Validate,
    Translate,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Validate => "validate",
            ActionType::Translate => "translate",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Completed => "completed",
            HistoryStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub owner_id: String,
    pub action_type: ActionType,
    pub file_name: String,
    pub recorded_at: DateTime<Utc>,
    pub status: HistoryStatus,
    pub error_count: Option<u32>,
    pub warning_count: Option<u32>,
    pub country: Option<String>,
}

impl HistoryEntry {
    pub fn validation(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        status: HistoryStatus,
        error_count: u32,
        warning_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            action_type: ActionType::Validate,
            file_name: file_name.into(),
            recorded_at: Utc::now(),
            status,
            error_count: Some(error_count),
            warning_count: Some(warning_count),
            country: None,
        }
    }

    pub fn translation(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        status: HistoryStatus,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            action_type: ActionType::Translate,
            file_name: file_name.into(),
            recorded_at: Utc::now(),
            status,
            error_count: None,
            warning_count: None,
            country: Some(country.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn date(&self) -> String {
        self.recorded_at.format("%Y-%m-%d").to_string()
    }

    pub fn time(&self) -> String {
        self.recorded_at.format("%H:%M:%S").to_string()
    }

    /// Counts belong to validations only, a country to translations only.
    pub fn check(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidEntry("entry id is empty".into()));
        }
        if self.owner_id.trim().is_empty() {
            return Err(EngineError::InvalidEntry(format!(
                "entry '{}' has no owner",
                self.id
            )));
        }

        let has_counts = self.error_count.is_some() || self.warning_count.is_some();
        match self.action_type {
            ActionType::Validate => {
                if self.error_count.is_none() || self.warning_count.is_none() {
                    return Err(EngineError::InvalidEntry(format!(
                        "validate entry '{}' needs error and warning counts",
                        self.id
                    )));
                }
                if self.country.is_some() {
                    return Err(EngineError::InvalidEntry(format!(
                        "validate entry '{}' must not carry a country",
                        self.id
                    )));
                }
            }
            ActionType::Translate => {
                if has_counts {
                    return Err(EngineError::InvalidEntry(format!(
                        "translate entry '{}' must not carry counts",
                        self.id
                    )));
                }
                if self.country.as_deref().map_or(true, |c| c.trim().is_empty()) {
                    return Err(EngineError::InvalidEntry(format!(
                        "translate entry '{}' needs a country",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }
}
