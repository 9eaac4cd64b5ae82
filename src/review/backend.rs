//! The validate/translate service, consumed as an opaque collaborator.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::findings::ValidationResult;

/// What the backend is asked to look at.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// An uploaded file (PDF or image).
    Upload(Vec<u8>),
    /// Label markup, e.g. an edited document sent for another pass.
    Markup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidateRequest {
    pub file_name: String,
    pub source: LabelSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslateRequest {
    pub file_name: String,
    pub source: LabelSource,
    pub target_country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TranslationResult {
    pub markup: String,
    pub target_country: String,
}

#[async_trait]
pub trait LabelBackend: Send + Sync {
    async fn validate(&self, request: ValidateRequest) -> Result<ValidationResult>;

    async fn translate(&self, request: TranslateRequest) -> Result<TranslationResult>;
}
