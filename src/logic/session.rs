use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{CascadeError, ImportError};
use crate::logic::cascade::{CascadeOptions, CascadeResolver, Completion};
use crate::logic::dispatch::FetchDispatcher;
use crate::logic::normalize::AssessmentNormalizer;
use crate::logic::validate::{TargetValidator, ValidationResult};
use crate::model::{
    generate_id, Id, ReadinessSummary, SavedInfo, SavedSelections, StageId, TargetKind,
    TargetPlatform, WizardSnapshot,
};
use crate::store::ResourceProvider;

/// Report document as the user imported it
#[derive(Debug, Clone)]
pub struct ImportedReport {
    pub path: PathBuf,
    pub document: Value,
}

/// State owned by one migration wizard for its lifetime: the target
/// cascade, the normalized assessment and per-page scratch values.
#[derive(Debug)]
pub struct MigrationSession {
    id: Id,
    created_at: DateTime<Utc>,
    resolver: CascadeResolver,
    dispatcher: FetchDispatcher,
    saved_info: Option<SavedInfo>,
    report: Option<ImportedReport>,
    selected_databases: Vec<String>,
    backup_config: Option<Value>,
}

impl MigrationSession {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        target_kind: TargetKind,
        options: CascadeOptions,
    ) -> Self {
        Self {
            id: generate_id(),
            created_at: Utc::now(),
            resolver: CascadeResolver::new(target_kind, options),
            dispatcher: FetchDispatcher::new(provider),
            saved_info: None,
            report: None,
            selected_databases: Vec::new(),
            backup_config: None,
        }
    }

    /// Rebuild a session from a saved snapshot. The original document is
    /// normalized again and the saved targets are restored as preferred
    /// choices once their stages load; call `refresh_accounts` to start.
    pub fn resume(
        provider: Arc<dyn ResourceProvider>,
        options: CascadeOptions,
        snapshot: WizardSnapshot,
    ) -> Result<Self, ImportError> {
        let kind = snapshot.target_kind.unwrap_or(TargetKind::ManagedInstance);
        let mut session = Self::new(provider, kind, options);

        session.import_document(PathBuf::from(&snapshot.report_path), snapshot.report)?;
        session
            .resolver
            .restore_preferred(snapshot.selections.preferred_ids());
        session.selected_databases = snapshot.databases_for_migration.clone();

        if let Some(info) = session.saved_info.as_mut() {
            info.migration_target_type = snapshot.target_kind;
            info.selections = snapshot.selections;
            info.databases_for_migration = snapshot.databases_for_migration;
        }

        log::info!(
            "Resumed session {} from report saved at {}",
            session.id,
            snapshot.saved_at
        );
        Ok(session)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolver(&self) -> &CascadeResolver {
        &self.resolver
    }

    pub fn saved_info(&self) -> Option<&SavedInfo> {
        self.saved_info.as_ref()
    }

    pub fn report(&self) -> Option<&ImportedReport> {
        self.report.as_ref()
    }

    pub fn selected_databases(&self) -> &[String] {
        &self.selected_databases
    }

    pub fn set_selected_databases(&mut self, databases: Vec<String>) {
        self.selected_databases = databases;
    }

    pub fn backup_config(&self) -> Option<&Value> {
        self.backup_config.as_ref()
    }

    pub fn set_backup_config(&mut self, config: Option<Value>) {
        self.backup_config = config;
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    pub fn refresh_accounts(&mut self) {
        let requests = self.resolver.refresh_accounts();
        self.dispatcher.dispatch(requests);
    }

    pub fn refresh_stage(&mut self, stage: StageId) -> Result<(), CascadeError> {
        let requests = self.resolver.refresh_stage(stage)?;
        self.dispatcher.dispatch(requests);
        Ok(())
    }

    pub fn select(&mut self, stage: StageId, candidate_id: &str) -> Result<(), CascadeError> {
        let requests = self.resolver.select_stage(stage, candidate_id)?;
        self.dispatcher.dispatch(requests);
        Ok(())
    }

    pub fn set_target_kind(&mut self, kind: TargetKind) {
        let requests = self.resolver.set_target_kind(kind);
        self.dispatcher.dispatch(requests);
    }

    /// Apply the next finished fetch, dispatching whatever it triggers.
    /// `None` once nothing is in flight.
    pub async fn pump_one(&mut self) -> Option<Completion> {
        let outcome = self.dispatcher.next_outcome().await?;
        let completion = self.resolver.on_fetch_complete(outcome);
        if let Completion::Applied { follow_up } = &completion {
            self.dispatcher.dispatch(follow_up.clone());
        }
        Some(completion)
    }

    /// Apply completions until no fetch is in flight
    pub async fn settle(&mut self) {
        while self.pump_one().await.is_some() {}
    }

    pub async fn import_report(&mut self, path: &Path) -> Result<&SavedInfo, ImportError> {
        let (document, _) = AssessmentNormalizer::import_file(path).await?;
        self.import_document(path.to_path_buf(), document)
    }

    /// Normalize `document` and replace any previous assessment with it
    pub fn import_document(
        &mut self,
        path: PathBuf,
        document: Value,
    ) -> Result<&SavedInfo, ImportError> {
        let info = AssessmentNormalizer::normalize(&path, &document)?;
        self.report = Some(ImportedReport { path, document });
        self.selected_databases.clear();
        Ok(self.saved_info.insert(info))
    }

    pub fn readiness(&self, platform: TargetPlatform) -> Option<ReadinessSummary> {
        self.saved_info
            .as_ref()
            .map(|info| ReadinessSummary::for_platform(&info.server_assessment, platform))
    }

    pub fn validate_targets(&self) -> ValidationResult {
        TargetValidator::validate(&self.resolver)
    }

    /// Copy the current targets into `SavedInfo` when every stage is valid.
    /// Returns the validation result either way.
    pub fn commit_targets(&mut self) -> ValidationResult {
        let validation = self.validate_targets();
        if !validation.valid {
            log::info!(
                "Session {} cannot commit targets: {} problem(s)",
                self.id,
                validation.errors.len()
            );
            return validation;
        }

        let selections = SavedSelections::from_path(self.resolver.current_selection_path());
        let info = self
            .saved_info
            .get_or_insert_with(|| SavedInfo::new(Default::default(), Vec::new()));
        info.selections = selections;
        info.migration_target_type = Some(self.resolver.target_kind());
        info.databases_for_migration = self.selected_databases.clone();
        // Restored choices have served their purpose
        self.resolver.clear_preferred();

        log::info!(
            "Session {} committed {} target",
            self.id,
            self.resolver.target_kind()
        );
        validation
    }

    /// Everything needed to resume later. `None` until a report is imported.
    pub fn snapshot(&self) -> Option<WizardSnapshot> {
        let report = self.report.as_ref()?;
        let (target_kind, selections) = match &self.saved_info {
            Some(info) => (info.migration_target_type, info.selections.clone()),
            None => (None, SavedSelections::default()),
        };

        Some(WizardSnapshot {
            report_path: report.path.display().to_string(),
            report: report.document.clone(),
            target_kind,
            selections,
            databases_for_migration: self.selected_databases.clone(),
            saved_at: Utc::now(),
        })
    }
}
