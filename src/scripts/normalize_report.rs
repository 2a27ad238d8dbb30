use anyhow::{bail, Result};
use sql_migration_wizard::model::{ReadinessSummary, TargetPlatform};
use sql_migration_wizard::AssessmentNormalizer;
use std::path::PathBuf;

/// Normalize an assessment report and print the resulting `SavedInfo` as JSON.
///
/// Usage: normalize-report <report.json>
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("Usage: normalize-report <report.json>");
    };

    let (_, info) = AssessmentNormalizer::import_file(&path).await?;

    println!("{}", serde_json::to_string_pretty(&info)?);

    for platform in [TargetPlatform::Mi, TargetPlatform::Vm, TargetPlatform::Db] {
        let summary = ReadinessSummary::for_platform(&info.server_assessment, platform);
        eprintln!(
            "{}: {} ready, {} ready with warnings, {} not ready ({} blockers, {} warnings)",
            platform.target_kind(),
            summary.ready,
            summary.ready_with_warnings,
            summary.not_ready,
            summary.blockers,
            summary.warnings
        );
    }

    Ok(())
}
