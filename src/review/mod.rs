//! Findings, selection, highlighting and the review session that ties them
//! to a document surface.

pub mod backend;
pub mod findings;
pub mod highlight;
pub mod issue_store;
pub mod selection;
pub mod session;

pub use backend::{LabelBackend, LabelSource, TranslateRequest, TranslationResult, ValidateRequest};
pub use findings::{
    Finding, FindingId, FindingKind, Location, RawFinding, Reference, Severity, SourceRef,
    ValidationResult,
};
pub use highlight::{HighlightCoordinator, HighlightState, DEFAULT_HIGHLIGHT_DURATION};
pub use issue_store::{IssueStore, LoadReport, SeverityCounts};
pub use selection::{SelectAllPolicy, SelectionSet};
pub use session::{ExportArtifact, ReviewSession};
