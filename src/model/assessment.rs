use crate::model::{same_name, TargetKind};
use serde::{Deserialize, Serialize};

/// Platform an assessment finding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPlatform {
    #[serde(rename = "AzureSqlVirtualMachine")]
    Vm,
    #[serde(rename = "AzureSqlManagedInstance")]
    Mi,
    #[serde(rename = "AzureSqlDatabase")]
    Db,
}

impl TargetPlatform {
    /// Maps a report's platform string. Both producers' spellings are
    /// accepted; anything unrecognized is treated as Azure SQL Database.
    pub fn from_report_value(value: &str) -> Self {
        const VM: [&str; 2] = ["VMSqlServer", "AzureSqlVirtualMachine"];
        const MI: [&str; 2] = ["ManagedSqlServer", "AzureSqlManagedInstance"];

        if VM.iter().any(|v| same_name(v, value)) {
            TargetPlatform::Vm
        } else if MI.iter().any(|v| same_name(v, value)) {
            TargetPlatform::Mi
        } else {
            TargetPlatform::Db
        }
    }

    pub fn target_kind(self) -> TargetKind {
        match self {
            TargetPlatform::Vm => TargetKind::VirtualMachine,
            TargetPlatform::Mi => TargetKind::ManagedInstance,
            TargetPlatform::Db => TargetKind::SqlDatabaseServer,
        }
    }
}

impl From<TargetKind> for TargetPlatform {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::VirtualMachine => TargetPlatform::Vm,
            TargetKind::ManagedInstance => TargetPlatform::Mi,
            TargetKind::SqlDatabaseServer => TargetPlatform::Db,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImpactedObject {
    pub name: String,
    pub object_type: String,
    pub impact_detail: String,
    pub containing_object_type: String,
}

/// One normalized assessment finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub rule_id: String,
    pub display_name: String,
    pub description: String,
    pub severity_level: String,
    /// `Issue` / `Warning` for tool exports, the rule category for DMA reports
    pub kind: String,
    pub target_platform: TargetPlatform,
    /// `None` for server-scoped findings
    pub database_name: Option<String>,
    pub impacted_objects: Vec<ImpactedObject>,
    pub restore_failure_flags: bool,
    pub help_link: String,
    pub message: String,
    pub tags: Vec<String>,
    pub timestamp: String,
}

impl Issue {
    pub fn is_blocker(&self) -> bool {
        same_name(&self.kind, "Issue")
    }

    pub fn is_warning(&self) -> bool {
        same_name(&self.kind, "Warning")
    }

    pub fn applies_to(&self, platform: TargetPlatform) -> bool {
        self.target_platform == platform
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseAssessment {
    pub name: String,
    pub issues: Vec<Issue>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerAssessment {
    pub issues: Vec<Issue>,
    pub database_assessments: Vec<DatabaseAssessment>,
    pub errors: Vec<String>,
}

impl ServerAssessment {
    pub fn database(&self, name: &str) -> Option<&DatabaseAssessment> {
        self.database_assessments
            .iter()
            .find(|db| same_name(&db.name, name))
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
            + self
                .database_assessments
                .iter()
                .map(|db| db.issues.len())
                .sum::<usize>()
    }

    /// Copy keeping only findings that apply to one of `platforms`
    pub fn filtered(&self, platforms: &[TargetPlatform]) -> ServerAssessment {
        let keep = |issues: &[Issue]| -> Vec<Issue> {
            issues
                .iter()
                .filter(|issue| platforms.contains(&issue.target_platform))
                .cloned()
                .collect()
        };

        ServerAssessment {
            issues: keep(&self.issues),
            database_assessments: self
                .database_assessments
                .iter()
                .map(|db| DatabaseAssessment {
                    name: db.name.clone(),
                    issues: keep(&db.issues),
                    errors: db.errors.clone(),
                })
                .collect(),
            errors: self.errors.clone(),
        }
    }
}

/// Per-platform migration readiness counts shown on the recommendation page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub platform: TargetPlatform,
    pub databases: usize,
    pub ready: usize,
    pub ready_with_warnings: usize,
    pub not_ready: usize,
    pub blockers: usize,
    pub warnings: usize,
}

impl ReadinessSummary {
    pub fn for_platform(assessment: &ServerAssessment, platform: TargetPlatform) -> Self {
        let databases = assessment.database_assessments.len();

        // Every database can be lifted onto a VM as-is
        if platform == TargetPlatform::Vm {
            return Self {
                platform,
                databases,
                ready: databases,
                ready_with_warnings: 0,
                not_ready: 0,
                blockers: 0,
                warnings: 0,
            };
        }

        let dbs = &assessment.database_assessments;
        let ready = dbs
            .iter()
            .filter(|db| !db.issues.iter().any(|i| i.applies_to(platform)))
            .count();
        let not_ready = dbs
            .iter()
            .filter(|db| db.issues.iter().any(|i| i.applies_to(platform) && i.is_blocker()))
            .count();

        let all_issues = || {
            assessment
                .issues
                .iter()
                .chain(dbs.iter().flat_map(|db| db.issues.iter()))
                .filter(move |i| i.applies_to(platform))
        };

        Self {
            platform,
            databases,
            ready,
            ready_with_warnings: databases - ready - not_ready,
            not_ready,
            blockers: all_issues().filter(|i| i.is_blocker()).count(),
            warnings: all_issues().filter(|i| i.is_warning()).count(),
        }
    }
}
