use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Case-insensitive comparison used for every Azure name/id match
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Migration target chosen on the recommendation page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[serde(rename = "AzureSqlManagedInstance")]
    ManagedInstance,
    #[serde(rename = "AzureSqlVirtualMachine")]
    VirtualMachine,
    #[serde(rename = "AzureSqlDatabase")]
    SqlDatabaseServer,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::ManagedInstance => "AzureSqlManagedInstance",
            TargetKind::VirtualMachine => "AzureSqlVirtualMachine",
            TargetKind::SqlDatabaseServer => "AzureSqlDatabase",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TargetKind::ManagedInstance,
            TargetKind::VirtualMachine,
            TargetKind::SqlDatabaseServer,
        ]
        .into_iter()
        .find(|kind| same_name(kind.as_str(), s))
        .ok_or_else(|| format!("unknown target kind '{}'", s))
    }
}
