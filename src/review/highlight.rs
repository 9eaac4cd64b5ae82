use std::{sync::Arc, time::Duration};

use log::debug;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::document::{DocumentSurface, SharedSurface};

use super::findings::{Finding, FindingId};

pub const DEFAULT_HIGHLIGHT_DURATION: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "findingId")]
pub enum HighlightState {
    #[default]
    Idle,
    Active(FindingId),
}

#[derive(Debug, Default)]
struct HighlightInner {
    state: HighlightState,
    /// Bumped on every transition; a pending expiry only fires if it still
    /// holds the current value.
    generation: u64,
}

/// Owns the single active highlight on a document surface. Activating a
/// finding always clears the previous markers first, and an expiry task
/// returns the coordinator to idle after `duration`.
pub struct HighlightCoordinator<S> {
    inner: Arc<Mutex<HighlightInner>>,
    surface: SharedSurface<S>,
    expiry: Arc<Mutex<Option<JoinHandle<()>>>>,
    duration: Duration,
}

impl<S> Clone for HighlightCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            surface: self.surface.clone(),
            expiry: self.expiry.clone(),
            duration: self.duration,
        }
    }
}

impl<S: DocumentSurface + 'static> HighlightCoordinator<S> {
    pub fn new(surface: SharedSurface<S>, duration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HighlightInner::default())),
            surface,
            expiry: Arc::new(Mutex::new(None)),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn state(&self) -> HighlightState {
        self.inner.lock().await.state
    }

    /// Highlight `finding`, or clear it if it is already the active one.
    pub async fn activate(&self, finding: &Finding) -> HighlightState {
        let mut inner = self.inner.lock().await;
        self.cancel_expiry().await;
        inner.generation += 1;

        let mut surface = self.surface.lock().await;
        surface.clear_highlights();

        if inner.state == HighlightState::Active(finding.id) {
            inner.state = HighlightState::Idle;
            return inner.state;
        }

        let marked = surface.highlight(
            &finding.location.selector,
            finding.severity.highlight_class(),
        );
        drop(surface);
        if marked == 0 {
            debug!(
                "Finding {} matched no nodes for selector '{}'",
                finding.id, finding.location.selector
            );
        }

        inner.state = HighlightState::Active(finding.id);
        self.spawn_expiry(inner.generation).await;
        inner.state
    }

    /// Drop any active highlight and pending expiry.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        self.cancel_expiry().await;
        inner.generation += 1;
        inner.state = HighlightState::Idle;
        self.surface.lock().await.clear_highlights();
    }

    async fn spawn_expiry(&self, generation: u64) {
        let inner = self.inner.clone();
        let surface = self.surface.clone();
        let duration = self.duration;

        let handle = tokio::spawn(async move {
            time::sleep(duration).await;
            let mut inner = inner.lock().await;
            if inner.generation != generation {
                return;
            }
            inner.generation += 1;
            inner.state = HighlightState::Idle;
            surface.lock().await.clear_highlights();
        });

        *self.expiry.lock().await = Some(handle);
    }

    async fn cancel_expiry(&self) {
        if let Some(handle) = self.expiry.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{shared, MarkupSurface};
    use crate::review::findings::{Location, RawFinding, Severity};

    const LABEL: &str = r#"<div class="nutrition-facts"><h1>Nutrition Facts</h1></div><div class="section">INGREDIENTS: Water</div><div class="section">STORAGE</div>"#;

    fn finding(index: usize, selector: &str, severity: Severity) -> Finding {
        let location = Location {
            selector: selector.into(),
            element_type: "block".into(),
        };
        RawFinding::missing(location, "item", severity, "")
            .into_finding(index)
            .unwrap()
    }

    fn coordinator() -> HighlightCoordinator<MarkupSurface> {
        let mut surface = MarkupSurface::new();
        surface.load(LABEL);
        HighlightCoordinator::new(shared(surface), DEFAULT_HIGHLIGHT_DURATION)
    }

    async fn marked_classes(coordinator: &HighlightCoordinator<MarkupSurface>) -> Vec<String> {
        let surface = coordinator.surface.lock().await;
        surface
            .markers()
            .into_iter()
            .map(|(_, class)| class.to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn activating_b_replaces_a() {
        let coordinator = coordinator();
        let a = finding(0, "div.nutrition-facts", Severity::Error);
        let b = finding(1, "div.section", Severity::Warning);

        coordinator.activate(&a).await;
        assert_eq!(marked_classes(&coordinator).await, ["highlight-error"]);

        let state = coordinator.activate(&b).await;
        assert_eq!(state, HighlightState::Active(FindingId(1)));
        assert_eq!(
            marked_classes(&coordinator).await,
            ["highlight-warning", "highlight-warning"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn activating_the_same_finding_toggles_off() {
        let coordinator = coordinator();
        let a = finding(0, "div.section", Severity::Info);

        coordinator.activate(&a).await;
        let state = coordinator.activate(&a).await;
        assert_eq!(state, HighlightState::Idle);
        assert!(marked_classes(&coordinator).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn highlight_expires_after_duration() {
        let coordinator = coordinator();
        let a = finding(0, "h1", Severity::Error);
        coordinator.activate(&a).await;

        time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(coordinator.state().await, HighlightState::Active(FindingId(0)));

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(coordinator.state().await, HighlightState::Idle);
        assert!(marked_classes(&coordinator).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_expiry_never_clears_later_highlight() {
        let coordinator = coordinator();
        let a = finding(0, "h1", Severity::Error);
        let b = finding(1, "div.section", Severity::Info);

        coordinator.activate(&a).await;
        time::sleep(Duration::from_millis(1500)).await;
        coordinator.activate(&b).await;

        // A's timer would have fired at 2000ms.
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(coordinator.state().await, HighlightState::Active(FindingId(1)));
        assert_eq!(marked_classes(&coordinator).await.len(), 2);

        time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(coordinator.state().await, HighlightState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_matches_still_activates() {
        let coordinator = coordinator();
        let missing = finding(0, "div.allergens", Severity::Warning);

        let state = coordinator.activate(&missing).await;
        assert_eq!(state, HighlightState::Active(FindingId(0)));
        assert!(marked_classes(&coordinator).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_markers() {
        let coordinator = coordinator();
        coordinator
            .activate(&finding(0, "div.section", Severity::Error))
            .await;
        coordinator.cancel().await;

        assert_eq!(coordinator.state().await, HighlightState::Idle);
        assert!(marked_classes(&coordinator).await.is_empty());
    }
}
