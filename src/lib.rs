pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;
pub use api::{AppState, WizardService};

pub use error::{ArchiveError, CascadeError, ImportError};

pub use logic::{
    AssessmentNormalizer, CascadeOptions, CascadeResolver, Completion, FetchOutcome, FetchRequest,
    MigrationSession, StageQuery, TargetValidator, ValidationResult,
};

// Export all model types
pub use model::*;

pub use store::{
    CachedResourceProvider, CatalogResourceProvider, ReportArchive, ResourceProvider, TtlCache,
};

/// Start the HTTP server on `listener` with an already-built service
pub async fn serve(listener: tokio::net::TcpListener, service: WizardService) -> anyhow::Result<()> {
    use std::sync::Arc;

    let app = crate::api::routes::create_router().with_state(Arc::new(service));
    axum::serve(listener, app).await?;

    Ok(())
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;
    let listener = TcpListener::bind(config.server_address()).await?;
    let service = WizardService::from_config(config).await?;

    serve(listener, service).await
}
