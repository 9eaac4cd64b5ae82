use std::collections::HashSet;

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

use super::findings::{Finding, FindingId, Severity, ValidationResult};

/// Per-severity tallies. `total()` always equals the store length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Outcome of loading a backend result into the store.
#[derive(Debug)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<EngineError>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Findings for the document under review, in payload order.
#[derive(Debug, Default)]
pub struct IssueStore {
    product_name: String,
    product_type: String,
    findings: Vec<Finding>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current findings. No merge, no re-sorting.
    pub fn load(&mut self, findings: Vec<Finding>) {
        self.findings = findings;
    }

    /// Validate `result` and replace the store with its findings. Malformed
    /// findings are left out and reported; a declared total that disagrees
    /// with the payload rejects the whole result and leaves the store as is.
    pub fn load_result(&mut self, result: &ValidationResult) -> EngineResult<LoadReport> {
        result.check_total()?;
        let parsed = result.parse_findings();

        self.product_name = result.product_name.clone();
        self.product_type = result.product_type.clone();
        self.load(parsed.findings);

        Ok(LoadReport {
            loaded: self.findings.len(),
            skipped: parsed.skipped,
        })
    }

    pub fn get(&self, id: FindingId) -> EngineResult<&Finding> {
        self.findings
            .iter()
            .find(|finding| finding.id == id)
            .ok_or_else(|| EngineError::not_found("finding", id))
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            counts.record(finding.severity);
        }
        counts
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn ids(&self) -> impl Iterator<Item = FindingId> + '_ {
        self.findings.iter().map(|finding| finding.id)
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    /// Remove the given findings, keeping the order of the rest. Unknown ids
    /// are ignored. Returns how many were removed.
    pub fn dismiss(&mut self, ids: &HashSet<FindingId>) -> usize {
        let before = self.findings.len();
        self.findings.retain(|finding| !ids.contains(&finding.id));
        before - self.findings.len()
    }

    pub fn clear(&mut self) {
        self.findings.clear();
        self.product_name.clear();
        self.product_type.clear();
    }
}
