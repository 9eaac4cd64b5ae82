//! Validation findings and the backend payload they arrive in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Marker class applied to highlighted document nodes.
    pub fn highlight_class(&self) -> &'static str {
        match self {
            Severity::Error => "highlight-error",
            Severity::Warning => "highlight-warning",
            Severity::Info => "highlight-info",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// Position of a finding in the payload it was loaded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FindingId(pub usize);

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub selector: String,
    pub element_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub source: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    #[serde(rename = "regulation")]
    pub regulation_id: String,
    #[serde(rename = "guidance")]
    pub guidance_text: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// Exactly one of these describes what is wrong at the location.
#[derive(Debug, Clone, PartialEq)]
pub enum FindingKind {
    Missing {
        item: String,
    },
    Incorrect {
        current_value: String,
        issue: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub id: FindingId,
    pub severity: Severity,
    pub kind: FindingKind,
    pub location: Location,
    pub reference: Reference,
    pub message: String,
}

impl Finding {
    /// Headline shown in the findings list.
    pub fn title(&self) -> &str {
        match &self.kind {
            FindingKind::Missing { item } => item,
            FindingKind::Incorrect { issue, .. } => issue,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, FindingKind::Missing { .. })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawMissing {
    #[serde(default)]
    item: String,
    severity: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawIncorrect {
    #[serde(default)]
    current_value: String,
    #[serde(default)]
    issue: String,
    severity: Option<String>,
    #[serde(default)]
    message: String,
}

/// A finding as the backend sends it. Deliberately lenient so one bad entry
/// can be skipped without rejecting the whole payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    missing: Option<RawMissing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    incorrect: Option<RawIncorrect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<Reference>,
}

impl RawFinding {
    pub fn missing(location: Location, item: &str, severity: Severity, message: &str) -> Self {
        Self {
            location: Some(location),
            missing: Some(RawMissing {
                item: item.into(),
                severity: Some(severity.as_str().into()),
                message: message.into(),
            }),
            incorrect: None,
            reference: Some(Reference::default()),
        }
    }

    pub fn incorrect(
        location: Location,
        current_value: &str,
        issue: &str,
        severity: Severity,
        message: &str,
    ) -> Self {
        Self {
            location: Some(location),
            missing: None,
            incorrect: Some(RawIncorrect {
                current_value: current_value.into(),
                issue: issue.into(),
                severity: Some(severity.as_str().into()),
                message: message.into(),
            }),
            reference: Some(Reference::default()),
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Validate and convert into a [`Finding`] whose id is `index`.
    pub fn into_finding(self, index: usize) -> Result<Finding, EngineError> {
        let invalid = |reason: &str| EngineError::InvalidFinding {
            index,
            reason: reason.to_string(),
        };

        let location = self.location.ok_or_else(|| invalid("missing location"))?;
        if location.selector.trim().is_empty() {
            return Err(invalid("empty selector"));
        }

        let (kind, severity, message) = match (self.missing, self.incorrect) {
            (Some(_), Some(_)) => return Err(invalid("both missing and incorrect are set")),
            (None, None) => return Err(invalid("neither missing nor incorrect is set")),
            (Some(m), None) => (FindingKind::Missing { item: m.item }, m.severity, m.message),
            (None, Some(i)) => (
                FindingKind::Incorrect {
                    current_value: i.current_value,
                    issue: i.issue,
                },
                i.severity,
                i.message,
            ),
        };

        let severity = match severity {
            Some(raw) => Severity::parse(&raw)
                .ok_or_else(|| invalid(&format!("unknown severity '{raw}'")))?,
            None => return Err(invalid("missing severity")),
        };

        let reference = self.reference.ok_or_else(|| invalid("missing reference"))?;

        Ok(Finding {
            id: FindingId(index),
            severity,
            kind,
            location,
            reference,
            message,
        })
    }
}

/// Payload returned by the validation backend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ValidationResult {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub source_html: String,
    #[serde(default)]
    pub total_errors: Option<usize>,
    #[serde(default)]
    pub errors: Vec<RawFinding>,
}

/// Findings that survived validation plus the ones that were skipped.
#[derive(Debug)]
pub struct ParsedFindings {
    pub findings: Vec<Finding>,
    pub skipped: Vec<EngineError>,
}

impl ValidationResult {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check the declared total against the payload length.
    pub fn check_total(&self) -> Result<(), EngineError> {
        match self.total_errors {
            Some(declared) if declared != self.errors.len() => Err(EngineError::TotalMismatch {
                declared,
                actual: self.errors.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Convert raw findings, keeping payload order and collecting the ones
    /// that failed validation.
    pub fn parse_findings(&self) -> ParsedFindings {
        let mut findings = Vec::with_capacity(self.errors.len());
        let mut skipped = Vec::new();
        for (index, raw) in self.errors.iter().cloned().enumerate() {
            match raw.into_finding(index) {
                Ok(finding) => findings.push(finding),
                Err(err) => skipped.push(err),
            }
        }
        ParsedFindings { findings, skipped }
    }
}
