use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::state::{AppState, SharedSession};
use crate::error::{ArchiveError, CascadeError, ImportError};
use crate::logic::{MigrationSession, ValidationResult};
use crate::model::{
    Id, ReadinessSummary, ResourceRef, SavedInfo, Stage, StageId, TargetKind, TargetPlatform,
};
use crate::store::SavedReport;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn cascade_error(e: CascadeError) -> ApiError {
    let status = match e {
        CascadeError::UnknownCandidate { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, &e.to_string())
}

fn import_error(e: ImportError) -> ApiError {
    match e {
        ImportError::OutsideImportDirectory { .. } => {
            api_error(StatusCode::FORBIDDEN, &e.to_string())
        }
        other => api_error(StatusCode::BAD_REQUEST, &other.to_string()),
    }
}

fn archive_error(e: ArchiveError) -> ApiError {
    match e {
        ArchiveError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, &e.to_string()),
        other => {
            log::error!("Report archive failure: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string())
        }
    }
}

fn session_or_404(state: &AppState, id: &str) -> Result<SharedSession, ApiError> {
    state
        .session(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Id,
    pub created_at: DateTime<Utc>,
    pub target_kind: TargetKind,
    pub stages: Vec<Stage>,
    pub selection_path: Vec<ResourceRef>,
    pub has_assessment: bool,
    pub selected_databases: Vec<String>,
}

impl From<&MigrationSession> for SessionResponse {
    fn from(session: &MigrationSession) -> Self {
        let resolver = session.resolver();
        Self {
            id: session.id().clone(),
            created_at: session.created_at(),
            target_kind: resolver.target_kind(),
            stages: resolver.stages().to_vec(),
            selection_path: resolver
                .current_selection_path()
                .into_iter()
                .cloned()
                .collect(),
            has_assessment: session.saved_info().is_some(),
            selected_databases: session.selected_databases().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    pub saved_info: SavedInfo,
    pub readiness: Vec<ReadinessSummary>,
}

impl AssessmentResponse {
    fn for_session(session: &MigrationSession) -> Option<Self> {
        let saved_info = session.saved_info()?.clone();
        let readiness = [TargetPlatform::Mi, TargetPlatform::Vm, TargetPlatform::Db]
            .into_iter()
            .filter_map(|platform| session.readiness(platform))
            .collect();
        Some(Self {
            saved_info,
            readiness,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    #[serde(flatten)]
    pub result: ValidationResult,
    pub message: String,
}

impl From<ValidationResult> for ValidationResponse {
    fn from(result: ValidationResult) -> Self {
        let message = result.message();
        Self { result, message }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub target_kind: Option<TargetKind>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub candidate_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetKindRequest {
    pub target_kind: TargetKind,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DatabasesRequest {
    pub databases: Vec<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        sessions: state.session_count(),
    })
}

/// Open a wizard session and load the linked accounts
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let kind = request.target_kind.unwrap_or(TargetKind::ManagedInstance);

    let session = MigrationSession::new(
        state.provider.clone(),
        kind,
        state.config.cascade_options(),
    );
    let (id, shared) = state.insert_session(session);
    log::info!("Opened session {} for {}", id, kind);

    let mut session = shared.lock().await;
    session.refresh_accounts();
    session.settle().await;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&*session))))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionResponse> {
    let shared = session_or_404(&state, &id)?;
    let session = shared.lock().await;
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(&id) {
        log::info!("Closed session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "Session not found"))
    }
}

/// Re-read the linked accounts, e.g. after the user linked a new one
pub async fn refresh_accounts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionResponse> {
    let shared = session_or_404(&state, &id)?;
    state.provider.invalidate_cache();

    let mut session = shared.lock().await;
    session.refresh_accounts();
    session.settle().await;
    Ok(Json(SessionResponse::from(&*session)))
}

/// Select a candidate and wait for the cascade below it to settle
pub async fn select_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(String, String)>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<SessionResponse> {
    let stage: StageId = stage
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, &e))?;
    let shared = session_or_404(&state, &id)?;

    let mut session = shared.lock().await;
    session
        .select(stage, &request.candidate_id)
        .map_err(cascade_error)?;
    session.settle().await;
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn refresh_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(String, String)>,
) -> ApiResult<SessionResponse> {
    let stage: StageId = stage
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, &e))?;
    let shared = session_or_404(&state, &id)?;

    let mut session = shared.lock().await;
    session.refresh_stage(stage).map_err(cascade_error)?;
    session.settle().await;
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn set_target_kind(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TargetKindRequest>,
) -> ApiResult<SessionResponse> {
    let shared = session_or_404(&state, &id)?;

    let mut session = shared.lock().await;
    session.set_target_kind(request.target_kind);
    session.settle().await;
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn validate_targets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ValidationResponse> {
    let shared = session_or_404(&state, &id)?;
    let session = shared.lock().await;
    Ok(Json(session.validate_targets().into()))
}

/// Copy the selected targets into the assessment; rejected with every
/// validation message when a stage is unresolved
pub async fn commit_targets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SavedInfo> {
    let shared = session_or_404(&state, &id)?;
    let mut session = shared.lock().await;

    let validation = session.commit_targets();
    if !validation.valid {
        return Err(api_error(StatusCode::BAD_REQUEST, &validation.message()));
    }
    session
        .saved_info()
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Targets were not saved"))
}

pub async fn import_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<AssessmentResponse> {
    let shared = session_or_404(&state, &id)?;
    let path = state
        .import_path(&request.path)
        .await
        .map_err(import_error)?;
    let mut session = shared.lock().await;

    session.import_report(&path).await.map_err(import_error)?;
    AssessmentResponse::for_session(&session)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Import produced no assessment"))
}

pub async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AssessmentResponse> {
    let shared = session_or_404(&state, &id)?;
    let session = shared.lock().await;

    AssessmentResponse::for_session(&session)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No assessment imported"))
}

pub async fn set_databases(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DatabasesRequest>,
) -> ApiResult<SessionResponse> {
    let shared = session_or_404(&state, &id)?;
    let mut session = shared.lock().await;

    if let Some(info) = session.saved_info() {
        if let Some(unknown) = request
            .databases
            .iter()
            .find(|db| !info.database_list.contains(db))
        {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                &format!("Database '{}' is not part of the assessment", unknown),
            ));
        }
    }
    session.set_selected_databases(request.databases);
    Ok(Json(SessionResponse::from(&*session)))
}

/// Persist the imported report and wizard choices for "resume later"
pub async fn save_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SavedReport> {
    let shared = session_or_404(&state, &id)?;
    let snapshot = {
        let session = shared.lock().await;
        session
            .snapshot()
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No assessment imported"))?
    };

    let saved = state.archive.save(&snapshot).await.map_err(archive_error)?;
    Ok(Json(saved))
}

pub async fn resume_session(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let snapshot = state.archive.load(&hash).await.map_err(archive_error)?;
    let session = MigrationSession::resume(
        state.provider.clone(),
        state.config.cascade_options(),
        snapshot,
    )
    .map_err(import_error)?;
    let (_, shared) = state.insert_session(session);

    let mut session = shared.lock().await;
    session.refresh_accounts();
    session.settle().await;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&*session))))
}
