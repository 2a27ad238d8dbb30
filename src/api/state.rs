use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::error::ImportError;
use crate::logic::MigrationSession;
use crate::model::Id;
use crate::store::{CachedResourceProvider, CatalogResourceProvider, ReportArchive, ResourceProvider};

pub type SharedSession = Arc<tokio::sync::Mutex<MigrationSession>>;

/// Everything the HTTP handlers share: open wizard sessions plus the
/// collaborators new sessions are built from
pub struct WizardService {
    pub config: AppConfig,
    pub provider: Arc<dyn ResourceProvider>,
    pub archive: ReportArchive,
    sessions: Mutex<HashMap<Id, SharedSession>>,
}

pub type AppState = Arc<WizardService>;

impl WizardService {
    pub fn new(config: AppConfig, provider: Arc<dyn ResourceProvider>) -> Self {
        let archive = ReportArchive::new(&config.storage.reports_dir);
        Self {
            config,
            provider,
            archive,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Build the service from configuration: the catalog provider with the
    /// account list memoized
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let catalog = CatalogResourceProvider::load(&config.provider.catalog_path).await?;
        let provider = CachedResourceProvider::new(
            catalog,
            config.cache_ttl(),
            config.cache.single_flight,
        );
        Ok(Self::new(config, Arc::new(provider)))
    }

    /// Resolve a client-supplied report path inside `storage.imports_dir`.
    /// Relative paths are taken from that directory; symlinks and `..`
    /// are resolved before the containment check.
    pub async fn import_path(&self, requested: &Path) -> Result<PathBuf, ImportError> {
        let root = tokio::fs::canonicalize(&self.config.storage.imports_dir)
            .await
            .map_err(|source| ImportError::Read {
                path: PathBuf::from(&self.config.storage.imports_dir),
                source,
            })?;

        let candidate = tokio::fs::canonicalize(root.join(requested))
            .await
            .map_err(|source| ImportError::Read {
                path: requested.to_path_buf(),
                source,
            })?;

        if !candidate.starts_with(&root) {
            log::warn!(
                "Rejected import of {} outside {}",
                candidate.display(),
                root.display()
            );
            return Err(ImportError::OutsideImportDirectory {
                path: requested.to_path_buf(),
            });
        }
        Ok(candidate)
    }

    pub fn insert_session(&self, session: MigrationSession) -> (Id, SharedSession) {
        let id = session.id().clone();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.lock().insert(id.clone(), Arc::clone(&shared));
        (id, shared)
    }

    pub fn session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
