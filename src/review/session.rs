use std::{future::Future, sync::Arc};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    document::{shared, DocumentSnapshot, DocumentSurface, KeyChord, SharedSurface},
    error::{EngineError, EngineResult},
    history::{HistoryEntry, HistoryRepository, HistoryStatus},
    identity::Identity,
    log_debug, log_error, log_info, log_warn,
    pagination::{Page, PageWindow, Paginator},
    settings::ReviewSettings,
};

use super::{
    backend::{LabelBackend, LabelSource, TranslateRequest, TranslationResult, ValidateRequest},
    findings::{Finding, FindingId, ValidationResult},
    highlight::{HighlightCoordinator, HighlightState},
    issue_store::{IssueStore, LoadReport, SeverityCounts},
    selection::{SelectAllPolicy, SelectionSet},
};

const ENABLE_LOGS: bool = true;

/// What produced the document currently on the surface.
#[derive(Debug, Clone, PartialEq)]
enum SessionOrigin {
    Validation { file_name: String },
    Translation { file_name: String, country: String },
}

impl SessionOrigin {
    fn file_name(&self) -> &str {
        match self {
            SessionOrigin::Validation { file_name } => file_name,
            SessionOrigin::Translation { file_name, .. } => file_name,
        }
    }
}

/// Document handed to the download/storage collaborator on export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    pub document: DocumentSnapshot,
}

/// One label under review: its findings, selection, highlight and editable
/// surface. Dropped when the user navigates away.
pub struct ReviewSession<S: DocumentSurface + 'static> {
    identity: Identity,
    issues: IssueStore,
    selection: SelectionSet<FindingId>,
    highlights: HighlightCoordinator<S>,
    surface: SharedSurface<S>,
    history: Arc<dyn HistoryRepository>,
    backend: Arc<dyn LabelBackend>,
    cancel: CancellationToken,
    paginator: Paginator,
    findings_page: usize,
    origin: Option<SessionOrigin>,
}

impl<S: DocumentSurface + 'static> ReviewSession<S> {
    pub fn new(
        identity: Identity,
        surface: S,
        history: Arc<dyn HistoryRepository>,
        backend: Arc<dyn LabelBackend>,
        settings: &ReviewSettings,
    ) -> Self {
        let surface = shared(surface);
        Self {
            identity,
            issues: IssueStore::new(),
            selection: SelectionSet::new(),
            highlights: HighlightCoordinator::new(surface.clone(), settings.highlight_duration()),
            surface,
            history,
            backend,
            cancel: CancellationToken::new(),
            paginator: Paginator::new(settings.page_size),
            findings_page: 1,
            origin: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn issues(&self) -> &IssueStore {
        &self.issues
    }

    pub fn counts(&self) -> SeverityCounts {
        self.issues.counts()
    }

    pub fn selection(&self) -> &SelectionSet<FindingId> {
        &self.selection
    }

    pub fn surface(&self) -> SharedSurface<S> {
        self.surface.clone()
    }

    /// Token that aborts in-flight backend calls, e.g. on navigation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn highlight_state(&self) -> HighlightState {
        self.highlights.state().await
    }

    pub async fn snapshot(&self) -> DocumentSnapshot {
        self.surface.lock().await.capture_snapshot()
    }

    /// Validate an uploaded label and load the findings and markup.
    pub async fn open_validation(&mut self, request: ValidateRequest) -> EngineResult<LoadReport> {
        let file_name = request.file_name.clone();
        let result = self.call_validate(request).await?;
        self.apply_validation(file_name, result).await
    }

    /// Send the current document for another validation pass.
    pub async fn revalidate(&mut self) -> EngineResult<LoadReport> {
        let file_name = self
            .origin
            .as_ref()
            .map(|origin| origin.file_name().to_string())
            .ok_or_else(|| EngineError::not_found("document", "review session"))?;
        let snapshot = self.snapshot().await;
        let request = ValidateRequest {
            file_name: file_name.clone(),
            source: LabelSource::Markup(snapshot.into_string()),
        };
        let result = self.call_validate(request).await?;
        self.apply_validation(file_name, result).await
    }

    /// Translate an uploaded label and load the translated markup.
    pub async fn open_translation(
        &mut self,
        request: TranslateRequest,
    ) -> EngineResult<TranslationResult> {
        if request.target_country.trim().is_empty() {
            return Err(EngineError::InvalidEntry(
                "translation requires a target country".to_string(),
            ));
        }
        let file_name = request.file_name.clone();
        let requested_country = request.target_country.clone();
        let backend = self.backend.clone();

        let result = match self.guarded(backend.translate(request)).await {
            Ok(result) => result,
            Err(EngineError::Backend(message)) => {
                self.record_failure(HistoryEntry::translation(
                    &self.identity.owner_id,
                    &file_name,
                    HistoryStatus::Failed,
                    &requested_country,
                ))
                .await;
                return Err(EngineError::Backend(message));
            }
            Err(err) => return Err(err),
        };

        let country = if result.target_country.trim().is_empty() {
            requested_country
        } else {
            result.target_country.clone()
        };
        let entry = HistoryEntry::translation(
            &self.identity.owner_id,
            &file_name,
            HistoryStatus::Completed,
            &country,
        );
        if let Err(err) = self.record_completion(entry).await {
            if matches!(err, EngineError::Cancelled) {
                log_info!("Dropping translation of {file_name}: session cancelled");
            }
            return Err(err);
        }

        self.highlights.cancel().await;
        self.surface.lock().await.load(&result.markup);
        self.issues.clear();
        self.selection.clear();
        self.findings_page = 1;
        self.origin = Some(SessionOrigin::Translation { file_name, country });

        Ok(result)
    }

    /// Highlight a finding's locations, or clear them if it is already active.
    pub async fn activate_finding(&self, id: FindingId) -> EngineResult<HighlightState> {
        let finding = self.issues.get(id)?.clone();
        let state = self.highlights.activate(&finding).await;
        log_debug!("Finding {id} -> {state:?}");
        Ok(state)
    }

    /// Check or uncheck a finding for bulk action.
    pub fn toggle_finding(&mut self, id: FindingId) -> EngineResult<bool> {
        self.issues.get(id)?;
        Ok(self.selection.toggle(id))
    }

    pub fn findings_window(&self) -> PageWindow {
        self.paginator.window(self.issues.len(), self.findings_page)
    }

    /// The visible page of the findings list.
    pub fn findings_page(&self) -> Page<'_, Finding> {
        self.paginator.page(self.issues.findings(), self.findings_page)
    }

    /// Move the findings list to `page` (clamped). The selection is dropped.
    pub fn go_to_findings_page(&mut self, page: usize) -> PageWindow {
        let window = self.paginator.window(self.issues.len(), page);
        self.findings_page = window.page;
        self.selection.clear();
        log_debug!("Findings page {} of {}", window.page, window.total_pages);
        window
    }

    /// The findings list's "select all" takes the visible page.
    pub fn select_all_findings(&mut self) {
        let page_ids: Vec<FindingId> = self
            .findings_page()
            .items
            .iter()
            .map(|finding| finding.id)
            .collect();
        let all_ids: Vec<FindingId> = self.issues.ids().collect();
        self.selection
            .select_all_with(SelectAllPolicy::CurrentPage, page_ids, all_ids);
    }

    /// Remove the selected findings. Returns how many were removed.
    pub async fn dismiss_selected(&mut self) -> usize {
        let ids = self.selection.take();
        if ids.is_empty() {
            return 0;
        }
        if let HighlightState::Active(active) = self.highlights.state().await {
            if ids.contains(&active) {
                self.highlights.cancel().await;
            }
        }
        let removed = self.issues.dismiss(&ids);
        self.findings_page = self.findings_window().page;
        log_info!("Dismissed {removed} findings, {} remain", self.issues.len());
        removed
    }

    /// Route an undo/redo shortcut to the surface.
    pub async fn handle_key(&self, chord: KeyChord) -> bool {
        self.surface.lock().await.handle_shortcut(chord)
    }

    /// Snapshot the document and record the export. A rejected history entry
    /// aborts the export.
    pub async fn export(&self) -> EngineResult<ExportArtifact> {
        let origin = self
            .origin
            .as_ref()
            .ok_or_else(|| EngineError::not_found("document", "review session"))?;
        let file_name = self.export_file_name(origin);
        let document = self.snapshot().await;

        let entry = match origin {
            SessionOrigin::Validation { .. } => {
                let counts = self.issues.counts();
                HistoryEntry::validation(
                    &self.identity.owner_id,
                    &file_name,
                    HistoryStatus::Completed,
                    count_u32(counts.error),
                    count_u32(counts.warning),
                )
            }
            SessionOrigin::Translation { country, .. } => HistoryEntry::translation(
                &self.identity.owner_id,
                &file_name,
                HistoryStatus::Completed,
                country,
            ),
        };
        self.history.append(entry).await?;

        log_info!(
            "Exported {file_name} (revision {}, {} bytes)",
            document.revision(),
            document.as_str().len()
        );
        Ok(ExportArtifact {
            file_name,
            document,
        })
    }

    /// Cancel in-flight calls, clear highlights and drop session state.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.highlights.cancel().await;
        self.issues.clear();
        self.selection.clear();
        self.findings_page = 1;
        self.origin = None;
    }

    fn export_file_name(&self, origin: &SessionOrigin) -> String {
        let product = self.issues.product_name().trim();
        let stem = if product.is_empty() {
            let source = origin.file_name();
            source
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .filter(|stem| !stem.is_empty())
                .unwrap_or(source)
        } else {
            product
        };
        format!("{stem}_edited.html")
    }

    async fn guarded<T, F>(&self, call: F) -> EngineResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            result = call => result.map_err(|err| {
                log_warn!("Backend call failed: {err:#}");
                EngineError::Backend(format!("{err:#}"))
            }),
        }
    }

    async fn call_validate(&self, request: ValidateRequest) -> EngineResult<ValidationResult> {
        let file_name = request.file_name.clone();
        let backend = self.backend.clone();
        match self.guarded(backend.validate(request)).await {
            Err(EngineError::Backend(message)) => {
                self.record_failure(HistoryEntry::validation(
                    &self.identity.owner_id,
                    &file_name,
                    HistoryStatus::Failed,
                    0,
                    0,
                ))
                .await;
                Err(EngineError::Backend(message))
            }
            other => other,
        }
    }

    async fn apply_validation(
        &mut self,
        file_name: String,
        result: ValidationResult,
    ) -> EngineResult<LoadReport> {
        let mut next = IssueStore::new();
        let report = next.load_result(&result)?;

        let counts = next.counts();
        let entry = HistoryEntry::validation(
            &self.identity.owner_id,
            &file_name,
            HistoryStatus::Completed,
            count_u32(counts.error),
            count_u32(counts.warning),
        );
        if let Err(err) = self.record_completion(entry).await {
            if matches!(err, EngineError::Cancelled) {
                log_info!("Dropping validation of {file_name}: session cancelled");
            }
            return Err(err);
        }

        self.highlights.cancel().await;
        if !result.source_html.is_empty() {
            self.surface.lock().await.load(&result.source_html);
        }
        self.issues = next;
        self.selection.clear();
        self.findings_page = 1;
        self.origin = Some(SessionOrigin::Validation { file_name });

        if report.skipped_count() > 0 {
            log_warn!("Skipped {} malformed findings", report.skipped_count());
        }
        log_info!(
            "Loaded {} findings ({} errors, {} warnings, {} info)",
            report.loaded,
            counts.error,
            counts.warning,
            counts.info
        );
        Ok(report)
    }

    /// Append the entry for a successful call. Cancellation observed before
    /// or during the append wins, and nothing may be applied afterwards.
    async fn record_completion(&self, entry: HistoryEntry) -> EngineResult<()> {
        let appended = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            appended = self.history.append(entry) => appended.map(|_| ()),
        };
        appended?;
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn record_failure(&self, entry: HistoryEntry) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Err(err) = self.history.append(entry).await {
            log_error!("Failed to record failed action: {err}");
        }
    }
}

fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use anyhow::bail;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::{
        document::MarkupSurface,
        history::{ActionType, InMemoryHistoryRepository},
        review::findings::{Location, RawFinding, Severity},
    };

    const LABEL: &str = r#"<div class="nutrition-facts"><h1>Nutrition Facts</h1><div class="calories">Calories 84</div></div><div class="section">INGREDIENTS: Water</div>"#;

    #[derive(Default)]
    struct FakeBackend {
        fail: AtomicBool,
        gate: Option<Arc<Notify>>,
        requests: Mutex<Vec<ValidateRequest>>,
    }

    fn location(selector: &str) -> Location {
        Location {
            selector: selector.into(),
            element_type: "block".into(),
        }
    }

    fn payload() -> ValidationResult {
        ValidationResult {
            product_name: "Fanta Orange".into(),
            product_type: "Carbonated Soft Drink".into(),
            source_html: LABEL.into(),
            total_errors: Some(2),
            errors: vec![
                RawFinding::missing(location("div.nutrition-facts"), "Vitamin D", Severity::Error, ""),
                RawFinding::incorrect(location("div.section"), "Water", "order", Severity::Warning, ""),
            ],
        }
    }

    #[async_trait]
    impl LabelBackend for FakeBackend {
        async fn validate(&self, request: ValidateRequest) -> anyhow::Result<ValidationResult> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.requests.lock().unwrap().push(request);
            if self.fail.load(Ordering::SeqCst) {
                bail!("service unavailable");
            }
            Ok(payload())
        }

        async fn translate(&self, request: TranslateRequest) -> anyhow::Result<TranslationResult> {
            if self.fail.load(Ordering::SeqCst) {
                bail!("service unavailable");
            }
            Ok(TranslationResult {
                markup: "<p>Eau</p>".into(),
                target_country: request.target_country,
            })
        }
    }

    struct Fixture {
        session: ReviewSession<MarkupSurface>,
        backend: Arc<FakeBackend>,
        history: Arc<InMemoryHistoryRepository>,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let backend = Arc::new(backend);
        let history = Arc::new(InMemoryHistoryRepository::new());
        let session = ReviewSession::new(
            Identity::user("alice", "Alice"),
            MarkupSurface::new(),
            history.clone(),
            backend.clone(),
            &ReviewSettings::default(),
        );
        Fixture {
            session,
            backend,
            history,
        }
    }

    fn upload() -> ValidateRequest {
        ValidateRequest {
            file_name: "fanta.pdf".into(),
            source: LabelSource::Upload(vec![0x25, 0x50, 0x44, 0x46]),
        }
    }

    #[tokio::test]
    async fn validation_loads_findings_surface_and_history() {
        let mut fx = fixture(FakeBackend::default());
        let report = fx.session.open_validation(upload()).await.unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(fx.session.counts().total(), 2);
        assert_eq!(fx.session.snapshot().await.as_str(), LABEL);

        let entries = fx.history.query_by_owner("alice").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, HistoryStatus::Completed);
        assert_eq!(entries[0].error_count, Some(1));
        assert_eq!(entries[0].warning_count, Some(1));
    }

    #[tokio::test]
    async fn backend_failure_keeps_state_and_records_failure() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();
        let before = fx.session.snapshot().await;

        fx.backend.fail.store(true, Ordering::SeqCst);
        let err = fx.session.open_validation(upload()).await.unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(err.is_recoverable());

        assert_eq!(fx.session.issues().len(), 2);
        assert_eq!(fx.session.snapshot().await, before);

        let entries = fx.history.query_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, HistoryStatus::Failed);
    }

    #[tokio::test]
    async fn cancelled_call_mutates_nothing() {
        let mut fx = fixture(FakeBackend {
            gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        let token = fx.session.cancellation_token();

        let (result, _) = tokio::join!(fx.session.open_validation(upload()), async {
            token.cancel();
        });

        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(fx.session.issues().is_empty());
        assert_eq!(fx.history.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn export_captures_edits_and_appends_entry() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();

        {
            let surface = fx.session.surface();
            let mut surface = surface.lock().await;
            let calories = surface.query("div.calories")[0];
            surface.replace_text(calories, "Calories 90");
        }

        let artifact = fx.session.export().await.unwrap();
        assert_eq!(artifact.file_name, "Fanta Orange_edited.html");
        assert!(artifact.document.as_str().contains("Calories 90"));

        let entries = fx.history.query_by_owner("alice").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "Fanta Orange_edited.html");
        assert_eq!(entries[0].action_type, ActionType::Validate);
    }

    #[tokio::test]
    async fn export_without_document_is_not_found() {
        let fx = fixture(FakeBackend::default());
        assert!(matches!(
            fx.session.export().await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn revalidate_sends_current_snapshot() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();
        {
            let surface = fx.session.surface();
            let mut surface = surface.lock().await;
            let section = surface.query(".section")[0];
            surface.replace_text(section, "INGREDIENTS: Water, Sugar");
        }

        fx.session.revalidate().await.unwrap();
        let requests = fx.backend.requests.lock().unwrap();
        match &requests[1].source {
            LabelSource::Markup(markup) => assert!(markup.contains("Water, Sugar")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[tokio::test]
    async fn dismissing_active_finding_clears_highlight() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();

        fx.session.activate_finding(FindingId(0)).await.unwrap();
        fx.session.toggle_finding(FindingId(0)).unwrap();
        assert_eq!(fx.session.dismiss_selected().await, 1);

        assert_eq!(fx.session.highlight_state().await, HighlightState::Idle);
        assert_eq!(fx.session.issues().len(), 1);
        assert!(fx.session.selection().is_empty());
        assert!(fx.session.activate_finding(FindingId(0)).await.is_err());
    }

    #[tokio::test]
    async fn select_all_findings_takes_visible_page() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();

        fx.session.select_all_findings();
        assert_eq!(fx.session.selection().size(), 2);
        fx.session.toggle_finding(FindingId(1)).unwrap();
        assert_eq!(fx.session.selection().size(), 1);
    }

    #[tokio::test]
    async fn changing_findings_page_clears_selection() {
        let settings = ReviewSettings {
            page_size: 1,
            ..ReviewSettings::default()
        };
        let mut session = ReviewSession::new(
            Identity::user("alice", "Alice"),
            MarkupSurface::new(),
            Arc::new(InMemoryHistoryRepository::new()),
            Arc::new(FakeBackend::default()),
            &settings,
        );
        session.open_validation(upload()).await.unwrap();
        assert_eq!(session.findings_window().total_pages, 2);

        session.select_all_findings();
        assert!(session.selection().is_selected(&FindingId(0)));

        let window = session.go_to_findings_page(9);
        assert_eq!(window.page, 2);
        assert!(session.selection().is_empty());

        session.select_all_findings();
        assert_eq!(session.selection().size(), 1);
        assert!(session.selection().is_selected(&FindingId(1)));
        assert_eq!(session.findings_page().items[0].id, FindingId(1));
    }

    /// Cancels the session token from inside `append`, as a navigation
    /// landing mid-write would.
    #[derive(Default)]
    struct CancellingHistory {
        inner: InMemoryHistoryRepository,
        token: Mutex<Option<CancellationToken>>,
    }

    #[async_trait]
    impl HistoryRepository for CancellingHistory {
        async fn append(&self, entry: HistoryEntry) -> EngineResult<HistoryEntry> {
            if let Some(token) = self.token.lock().unwrap().clone() {
                token.cancel();
            }
            tokio::task::yield_now().await;
            self.inner.append(entry).await
        }

        async fn query_by_owner(&self, owner_id: &str) -> EngineResult<Vec<HistoryEntry>> {
            self.inner.query_by_owner(owner_id).await
        }

        async fn query_all(&self) -> EngineResult<Vec<HistoryEntry>> {
            self.inner.query_all().await
        }

        async fn delete_by_ids(
            &self,
            ids: &std::collections::HashSet<String>,
        ) -> EngineResult<usize> {
            self.inner.delete_by_ids(ids).await
        }

        async fn count(&self, owner_id: Option<&str>) -> EngineResult<usize> {
            self.inner.count(owner_id).await
        }
    }

    fn cancelling_session() -> ReviewSession<MarkupSurface> {
        let history = Arc::new(CancellingHistory::default());
        let session = ReviewSession::new(
            Identity::user("alice", "Alice"),
            MarkupSurface::new(),
            history.clone(),
            Arc::new(FakeBackend::default()),
            &ReviewSettings::default(),
        );
        *history.token.lock().unwrap() = Some(session.cancellation_token());
        session
    }

    #[tokio::test]
    async fn cancellation_during_history_write_mutates_nothing() {
        let mut session = cancelling_session();

        let result = session.open_validation(upload()).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(session.issues().is_empty());
        assert_eq!(session.snapshot().await.as_str(), "");
        assert!(matches!(
            session.export().await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_during_translation_write_keeps_surface() {
        let mut session = cancelling_session();

        let result = session
            .open_translation(TranslateRequest {
                file_name: "fanta.pdf".into(),
                source: LabelSource::Upload(Vec::new()),
                target_country: "FR".into(),
            })
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(session.snapshot().await.as_str(), "");
    }

    #[tokio::test]
    async fn translation_without_country_is_rejected_up_front() {
        let mut fx = fixture(FakeBackend::default());
        fx.backend.fail.store(true, Ordering::SeqCst);

        let err = fx
            .session
            .open_translation(TranslateRequest {
                file_name: "fanta.pdf".into(),
                source: LabelSource::Upload(Vec::new()),
                target_country: "  ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidEntry(_)));
        assert_eq!(fx.history.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn translation_replaces_document_and_logs_country() {
        let mut fx = fixture(FakeBackend::default());
        let result = fx
            .session
            .open_translation(TranslateRequest {
                file_name: "fanta.pdf".into(),
                source: LabelSource::Upload(Vec::new()),
                target_country: "FR".into(),
            })
            .await
            .unwrap();

        assert_eq!(result.target_country, "FR");
        assert_eq!(fx.session.snapshot().await.as_str(), "<p>Eau</p>");
        let artifact = fx.session.export().await.unwrap();
        assert_eq!(artifact.file_name, "fanta_edited.html");

        let entries = fx.history.query_all().await.unwrap();
        assert!(entries
            .iter()
            .all(|e| e.action_type == ActionType::Translate && e.country.as_deref() == Some("FR")));
    }

    #[tokio::test]
    async fn undo_shortcut_reaches_surface() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();
        {
            let surface = fx.session.surface();
            let mut surface = surface.lock().await;
            let section = surface.query(".section")[0];
            surface.replace_text(section, "edited");
        }

        assert!(fx.session.handle_key(KeyChord::ctrl('z')).await);
        assert_eq!(fx.session.snapshot().await.as_str(), LABEL);
    }

    #[tokio::test]
    async fn close_discards_state_and_blocks_calls() {
        let mut fx = fixture(FakeBackend::default());
        fx.session.open_validation(upload()).await.unwrap();
        fx.session.activate_finding(FindingId(1)).await.unwrap();

        fx.session.close().await;
        assert_eq!(fx.session.highlight_state().await, HighlightState::Idle);
        assert!(fx.session.issues().is_empty());
        assert!(matches!(
            fx.session.open_validation(upload()).await,
            Err(EngineError::Cancelled)
        ));
    }
}
