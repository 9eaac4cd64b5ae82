//! Review engine for machine-generated label compliance findings: findings
//! and their highlights on an editable label document, snapshot-on-demand
//! export, and a persistent activity history.

pub mod document;
pub mod error;
pub mod history;
pub mod identity;
pub mod pagination;
pub mod review;
pub mod settings;

mod db;
mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use log::info;

pub use db::Database;
pub use document::{DocumentSnapshot, DocumentSurface, KeyChord, MarkupSurface};
pub use error::{EngineError, EngineResult};
pub use history::{
    HistoryEntry, HistoryFilter, HistoryListView, HistoryRepository, HistoryStats,
    SqliteHistoryRepository,
};
pub use identity::Identity;
pub use review::{LabelBackend, ReviewSession};
pub use settings::{ReviewSettings, SettingsStore};

/// Initialize `env_logger`, reading `RUST_LOG` with an `Info` default.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Long-lived pieces shared by every review session: the history database
/// and the settings file under one data directory.
pub struct Engine {
    data_dir: PathBuf,
    db: Database,
    history: Arc<dyn HistoryRepository>,
    settings: SettingsStore,
}

impl Engine {
    pub fn open(data_dir: impl AsRef<Path>) -> EngineResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("labelreview.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let history: Arc<dyn HistoryRepository> = Arc::new(SqliteHistoryRepository::new(db.clone()));

        info!("Review engine ready at {}", data_dir.display());
        Ok(Self {
            data_dir,
            db,
            history,
            settings,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn history(&self) -> Arc<dyn HistoryRepository> {
        self.history.clone()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Effective settings: the stored file plus environment overrides.
    pub fn review_settings(&self) -> ReviewSettings {
        self.settings.review().with_env_overrides()
    }

    pub fn start_session<S: DocumentSurface + 'static>(
        &self,
        identity: Identity,
        surface: S,
        backend: Arc<dyn LabelBackend>,
    ) -> ReviewSession<S> {
        info!("Starting review session for {}", identity.owner_id);
        ReviewSession::new(
            identity,
            surface,
            self.history.clone(),
            backend,
            &self.review_settings(),
        )
    }

    /// The history screen for `identity`: every owner's entries for
    /// privileged identities, their own otherwise.
    pub fn history_view(&self, identity: Identity) -> HistoryListView {
        let page_size = self.review_settings().page_size;
        if identity.is_privileged {
            HistoryListView::new(
                self.history.clone(),
                identity,
                review::SelectAllPolicy::EntireCollection,
                page_size,
            )
        } else {
            HistoryListView::for_user(self.history.clone(), identity, page_size)
        }
    }
}
