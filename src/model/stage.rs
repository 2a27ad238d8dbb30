use crate::model::{same_name, ResourceRef, TargetKind};
use serde::{Deserialize, Serialize};

/// Links of the target-selection cascade, in chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Account,
    Tenant,
    Subscription,
    Location,
    ResourceGroup,
    Instance,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Account,
        StageId::Tenant,
        StageId::Subscription,
        StageId::Location,
        StageId::ResourceGroup,
        StageId::Instance,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<StageId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<StageId> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Account => "account",
            StageId::Tenant => "tenant",
            StageId::Subscription => "subscription",
            StageId::Location => "location",
            StageId::ResourceGroup => "resource_group",
            StageId::Instance => "instance",
        }
    }

    /// Label of the sentinel candidate standing in for an empty result
    pub fn not_found_message(self, kind: TargetKind) -> &'static str {
        match self {
            StageId::Account => "Add a linked account and then try again.",
            StageId::Tenant => "No tenants found.",
            StageId::Subscription => "No subscriptions found.",
            StageId::Location => "No locations found.",
            StageId::ResourceGroup => "No resource groups found.",
            StageId::Instance => match kind {
                TargetKind::ManagedInstance => "No managed instances found.",
                TargetKind::VirtualMachine => "No virtual machines found.",
                TargetKind::SqlDatabaseServer => "No Azure SQL database servers found.",
            },
        }
    }

    pub fn invalid_selection_message(self, kind: TargetKind) -> &'static str {
        match self {
            StageId::Account => "To continue, select a valid Azure account.",
            StageId::Tenant => "To continue, select a valid tenant.",
            StageId::Subscription => "To continue, select a valid subscription.",
            StageId::Location => "To continue, select a valid location.",
            StageId::ResourceGroup => "To continue, select a valid resource group.",
            StageId::Instance => match kind {
                TargetKind::ManagedInstance => "To continue, select a valid managed instance.",
                TargetKind::VirtualMachine => "To continue, select a valid virtual machine.",
                TargetKind::SqlDatabaseServer => {
                    "To continue, select a valid Azure SQL Database server."
                }
            },
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stage| same_name(stage.as_str(), &normalized))
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Entry of a stage's candidate list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidate {
    Resource(ResourceRef),
    /// Synthetic entry for an empty or failed lookup; never selectable
    NotFound { message: String },
}

impl Candidate {
    pub fn not_found(stage: StageId, kind: TargetKind) -> Self {
        Candidate::NotFound {
            message: stage.not_found_message(kind).to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Candidate::NotFound { .. })
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Candidate::Resource(resource) => Some(resource),
            Candidate::NotFound { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Candidate::Resource(resource) => resource.display_name(),
            Candidate::NotFound { message } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub selected: Option<ResourceRef>,
    pub candidates: Vec<Candidate>,
    pub is_loading: bool,
    pub generation: u64,
}

impl Stage {
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            selected: None,
            candidates: Vec::new(),
            is_loading: false,
            generation: 0,
        }
    }

    /// Drop the selection and candidates and start a new generation.
    /// Returns the generation any fetch for this stage must now carry.
    pub fn invalidate(&mut self) -> u64 {
        self.selected = None;
        self.candidates.clear();
        self.is_loading = true;
        self.generation += 1;
        self.generation
    }

    pub fn find_candidate(&self, candidate_id: &str) -> Option<&ResourceRef> {
        self.real_candidates().find(|r| r.id() == candidate_id)
    }

    pub fn real_candidates(&self) -> impl Iterator<Item = &ResourceRef> {
        self.candidates.iter().filter_map(Candidate::resource)
    }

    pub fn has_only_sentinel(&self) -> bool {
        !self.candidates.is_empty() && self.candidates.iter().all(Candidate::is_sentinel)
    }
}
