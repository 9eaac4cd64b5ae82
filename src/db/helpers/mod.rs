use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{ActionType, HistoryStatus};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn to_optional_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value.map(|raw| to_u32(raw, field)).transpose()
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_action_type(value: &str) -> Result<ActionType> {
    match value {
        "validate" => Ok(ActionType::Validate),
        "translate" => Ok(ActionType::Translate),
        other => Err(anyhow!("unknown action type {other}")),
    }
}

pub fn parse_history_status(value: &str) -> Result<HistoryStatus> {
    match value {
        "completed" => Ok(HistoryStatus::Completed),
        "failed" => Ok(HistoryStatus::Failed),
        other => Err(anyhow!("unknown history status {other}")),
    }
}
