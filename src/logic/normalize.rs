//! Assessment report import.
//!
//! Two producers write assessment reports: the Data Migration Assistant
//! (marker `DmaVersion`) and the SQL assessment tool (marker
//! `AssessmentToolVersion`). Each shape is decoded into its own raw serde
//! types and then mapped into the canonical [`SavedInfo`].

use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ImportError;
use crate::model::{
    DatabaseAssessment, ImpactedObject, Issue, SavedInfo, ServerAssessment, TargetPlatform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportShape {
    /// Data Migration Assistant export
    Dma,
    /// SQL assessment tool export
    AssessmentTool,
}

impl ReportShape {
    const DMA_MARKER: &'static str = "DmaVersion";
    const TOOL_MARKER: &'static str = "AssessmentToolVersion";

    pub fn detect(document: &Value) -> Option<Self> {
        let object = document.as_object()?;
        if object.contains_key(Self::DMA_MARKER) {
            Some(ReportShape::Dma)
        } else if object.contains_key(Self::TOOL_MARKER) {
            Some(ReportShape::AssessmentTool)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ReportShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportShape::Dma => write!(f, "DMA report"),
            ReportShape::AssessmentTool => write!(f, "assessment tool report"),
        }
    }
}

// Shared raw pieces

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawError {
    Text(String),
    Detailed {
        #[serde(rename = "Message")]
        message: String,
    },
    Other(Value),
}

impl RawError {
    fn into_message(self) -> String {
        match self {
            RawError::Text(text) => text,
            RawError::Detailed { message } => message,
            RawError::Other(value) => value.to_string(),
        }
    }
}

fn error_messages(errors: Vec<RawError>) -> Vec<String> {
    errors.into_iter().map(RawError::into_message).collect()
}

/// Report producers write `null` for fields they have no value for
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawImpactedObject {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(deserialize_with = "null_as_default")]
    object_type: String,
    #[serde(deserialize_with = "null_as_default")]
    impact_detail: String,
    #[serde(deserialize_with = "null_as_default")]
    database_object_type: String,
}

impl From<RawImpactedObject> for ImpactedObject {
    fn from(raw: RawImpactedObject) -> Self {
        ImpactedObject {
            name: raw.name,
            object_type: raw.object_type,
            impact_detail: raw.impact_detail,
            containing_object_type: raw.database_object_type,
        }
    }
}

// Data Migration Assistant

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DmaReport {
    #[serde(deserialize_with = "null_as_default")]
    target_platform: String,
    #[serde(deserialize_with = "null_as_default")]
    server_instances: Vec<DmaServerInstance>,
    #[serde(deserialize_with = "null_as_default")]
    databases: Vec<DmaDatabase>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DmaServerInstance {
    #[serde(deserialize_with = "null_as_default")]
    assessment_recommendations: Vec<DmaRecommendation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DmaDatabase {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    target_platform: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    assessment_recommendations: Vec<DmaRecommendation>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DmaRecommendation {
    #[serde(deserialize_with = "null_as_default")]
    rule_id: String,
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    recommendation: String,
    #[serde(deserialize_with = "null_as_default")]
    more_info: String,
    #[serde(deserialize_with = "null_as_default")]
    severity: String,
    #[serde(deserialize_with = "null_as_default")]
    category: String,
    #[serde(deserialize_with = "null_as_default")]
    impact: String,
    #[serde(deserialize_with = "null_as_default")]
    change_category: String,
    target_platform: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    impacted_objects: Vec<RawImpactedObject>,
}

impl DmaRecommendation {
    fn into_issue(self, platform: &str, database_name: Option<&str>) -> Issue {
        let platform = self.target_platform.as_deref().unwrap_or(platform);
        Issue {
            rule_id: self.rule_id,
            display_name: self.title,
            description: self.recommendation,
            severity_level: self.severity,
            kind: self.category,
            target_platform: TargetPlatform::from_report_value(platform),
            database_name: database_name.map(str::to_string),
            impacted_objects: self.impacted_objects.into_iter().map(Into::into).collect(),
            restore_failure_flags: false,
            help_link: self.more_info,
            message: self.impact,
            tags: if self.change_category.is_empty() {
                Vec::new()
            } else {
                vec![self.change_category]
            },
            timestamp: String::new(),
        }
    }
}

impl DmaReport {
    fn into_saved_info(self) -> SavedInfo {
        let DmaReport {
            target_platform,
            server_instances,
            databases,
            errors,
        } = self;

        if server_instances.len() > 1 {
            log::warn!(
                "Report lists {} server instances; only the first is assessed",
                server_instances.len()
            );
        }
        let issues: Vec<Issue> = server_instances
            .into_iter()
            .next()
            .map(|server| {
                server
                    .assessment_recommendations
                    .into_iter()
                    .map(|r| r.into_issue(&target_platform, None))
                    .collect()
            })
            .unwrap_or_default();

        let database_list: Vec<String> = databases
            .iter()
            .map(|db| db.name.clone())
            .filter(|name| !name.is_empty())
            .sorted()
            .dedup()
            .collect();

        let database_assessments: Vec<DatabaseAssessment> = databases
            .into_iter()
            .map(|db| {
                let platform = db.target_platform.as_deref().unwrap_or(&target_platform);
                DatabaseAssessment {
                    issues: db
                        .assessment_recommendations
                        .into_iter()
                        .map(|r| r.into_issue(platform, Some(db.name.as_str())))
                        .collect(),
                    errors: error_messages(db.errors),
                    name: db.name,
                }
            })
            .collect();

        SavedInfo::new(
            ServerAssessment {
                issues,
                database_assessments,
                errors: error_messages(errors),
            },
            database_list,
        )
    }
}

// SQL assessment tool

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolReport {
    #[serde(deserialize_with = "null_as_default")]
    servers: Vec<ToolServer>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolServer {
    #[serde(deserialize_with = "null_as_default")]
    server_assessments: Vec<ToolAssessment>,
    #[serde(deserialize_with = "null_as_default")]
    databases: Vec<ToolDatabase>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolDatabase {
    properties: Option<ToolDatabaseProperties>,
    #[serde(deserialize_with = "null_as_default")]
    database_assessments: Vec<ToolAssessment>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolDatabaseProperties {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolAssessment {
    #[serde(deserialize_with = "null_as_default")]
    rule_metadata: ToolRuleMetadata,
    #[serde(deserialize_with = "null_as_default")]
    timestamp: String,
    #[serde(deserialize_with = "null_as_default")]
    issue_category: String,
    #[serde(deserialize_with = "null_as_default")]
    applies_to_migration_target_platform: String,
    #[serde(deserialize_with = "null_as_default")]
    database_restore_fails: bool,
    database_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    impacted_objects: Vec<RawImpactedObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ToolRuleMetadata {
    #[serde(deserialize_with = "null_as_default")]
    id: String,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    description: String,
    #[serde(deserialize_with = "null_as_default")]
    help_link: String,
    #[serde(deserialize_with = "null_as_default")]
    level: String,
    #[serde(deserialize_with = "null_as_default")]
    message: String,
}

impl ToolAssessment {
    fn into_issue(self, database_name: Option<&str>) -> Issue {
        let metadata = self.rule_metadata;
        Issue {
            display_name: metadata.id.clone(),
            rule_id: metadata.id,
            description: metadata.description,
            severity_level: metadata.level,
            kind: self.issue_category,
            target_platform: TargetPlatform::from_report_value(
                &self.applies_to_migration_target_platform,
            ),
            database_name: database_name.map(str::to_string),
            impacted_objects: self.impacted_objects.into_iter().map(Into::into).collect(),
            restore_failure_flags: self.database_restore_fails,
            help_link: metadata.help_link,
            message: metadata.message,
            tags: metadata.tags,
            timestamp: self.timestamp,
        }
    }
}

impl ToolDatabase {
    fn name(&self) -> String {
        self.properties
            .as_ref()
            .map(|p| p.name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.database_assessments
                    .first()
                    .and_then(|a| a.database_name.clone())
            })
            .unwrap_or_default()
    }
}

impl ToolReport {
    fn into_saved_info(self) -> SavedInfo {
        let ToolReport { servers, errors } = self;

        if servers.len() > 1 {
            log::warn!(
                "Report lists {} servers; only the first is assessed",
                servers.len()
            );
        }
        let server = servers.into_iter().next().unwrap_or_default();

        let issues: Vec<Issue> = server
            .server_assessments
            .into_iter()
            .map(|a| a.into_issue(None))
            .collect();

        let database_assessments: Vec<DatabaseAssessment> = server
            .databases
            .into_iter()
            .map(|db| {
                let name = db.name();
                DatabaseAssessment {
                    issues: db
                        .database_assessments
                        .into_iter()
                        .map(|a| a.into_issue(Some(name.as_str())))
                        .collect(),
                    errors: error_messages(db.errors),
                    name,
                }
            })
            .collect();

        let database_list: Vec<String> = database_assessments
            .iter()
            .map(|db| db.name.clone())
            .filter(|name| !name.is_empty())
            .sorted()
            .dedup()
            .collect();

        let mut all_errors = error_messages(errors);
        all_errors.extend(error_messages(server.errors));

        SavedInfo::new(
            ServerAssessment {
                issues,
                database_assessments,
                errors: all_errors,
            },
            database_list,
        )
    }
}

pub struct AssessmentNormalizer;

impl AssessmentNormalizer {
    /// Map an already-parsed report into a fresh `SavedInfo`.
    /// `path` is only used for the invalid-format message.
    pub fn normalize(path: &Path, document: &Value) -> Result<SavedInfo, ImportError> {
        let invalid = || ImportError::InvalidFormat {
            path: path.to_path_buf(),
        };
        let shape = ReportShape::detect(document).ok_or_else(invalid)?;

        let info = match shape {
            ReportShape::Dma => serde_json::from_value::<DmaReport>(document.clone())
                .map_err(|e| {
                    log::debug!("DMA report did not decode: {}", e);
                    invalid()
                })?
                .into_saved_info(),
            ReportShape::AssessmentTool => serde_json::from_value::<ToolReport>(document.clone())
                .map_err(|e| {
                    log::debug!("Assessment tool report did not decode: {}", e);
                    invalid()
                })?
                .into_saved_info(),
        };

        log::info!(
            "Imported {} from {}: {} databases, {} issues",
            shape,
            path.display(),
            info.database_list.len(),
            info.server_assessment.issue_count()
        );
        Ok(info)
    }

    /// Read and parse a report file. Returns the raw document alongside the
    /// normalized form, since saving a report keeps the original verbatim.
    pub async fn import_file(path: &Path) -> Result<(Value, SavedInfo), ImportError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ImportError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let document: Value =
            serde_json::from_slice(&bytes).map_err(|_| ImportError::InvalidFormat {
                path: path.to_path_buf(),
            })?;
        let info = Self::normalize(path, &document)?;
        Ok((document, info))
    }
}
