use crate::model::{
    AccountRef, InstanceRef, LocationRef, ResourceGroupRef, ResourceRef, ServerAssessment, StageId,
    SubscriptionRef, TargetKind, TenantRef,
};
use serde::{Deserialize, Serialize};

/// Targets committed when the user leaves the target-selection page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedSelections {
    pub azure_account: Option<AccountRef>,
    pub azure_tenant: Option<TenantRef>,
    pub subscription: Option<SubscriptionRef>,
    pub location: Option<LocationRef>,
    pub resource_group: Option<ResourceGroupRef>,
    pub target_server_instance: Option<InstanceRef>,
}

impl SavedSelections {
    pub fn from_path<'a>(path: impl IntoIterator<Item = &'a ResourceRef>) -> Self {
        let mut selections = SavedSelections::default();
        for resource in path {
            match resource {
                ResourceRef::Account(r) => selections.azure_account = Some(r.clone()),
                ResourceRef::Tenant(r) => selections.azure_tenant = Some(r.clone()),
                ResourceRef::Subscription(r) => selections.subscription = Some(r.clone()),
                ResourceRef::Location(r) => selections.location = Some(r.clone()),
                ResourceRef::ResourceGroup(r) => selections.resource_group = Some(r.clone()),
                ResourceRef::Instance(r) => selections.target_server_instance = Some(r.clone()),
            }
        }
        selections
    }

    /// Stage -> id pairs used to restore these choices into a fresh cascade
    pub fn preferred_ids(&self) -> Vec<(StageId, String)> {
        [
            (StageId::Account, self.azure_account.as_ref().map(|r| &r.id)),
            (StageId::Tenant, self.azure_tenant.as_ref().map(|r| &r.id)),
            (StageId::Subscription, self.subscription.as_ref().map(|r| &r.id)),
            (StageId::Location, self.location.as_ref().map(|r| &r.id)),
            (StageId::ResourceGroup, self.resource_group.as_ref().map(|r| &r.id)),
            (
                StageId::Instance,
                self.target_server_instance.as_ref().map(|r| &r.id),
            ),
        ]
        .into_iter()
        .filter_map(|(stage, id)| id.map(|id| (stage, id.clone())))
        .collect()
    }
}

/// Canonical in-memory result of importing an assessment report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedInfo {
    pub server_assessment: ServerAssessment,
    /// Sorted, de-duplicated
    pub database_list: Vec<String>,
    pub migration_target_type: Option<TargetKind>,
    #[serde(flatten)]
    pub selections: SavedSelections,
    pub databases_for_migration: Vec<String>,
    pub target_database_names: Vec<String>,
}

impl SavedInfo {
    pub fn new(server_assessment: ServerAssessment, database_list: Vec<String>) -> Self {
        Self {
            server_assessment,
            database_list,
            migration_target_type: None,
            selections: SavedSelections::default(),
            databases_for_migration: Vec::new(),
            target_database_names: Vec::new(),
        }
    }
}

/// What "save assessment report" writes: the imported document verbatim
/// plus the wizard choices needed to resume later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    pub report_path: String,
    pub report: serde_json::Value,
    pub target_kind: Option<TargetKind>,
    #[serde(default)]
    pub selections: SavedSelections,
    #[serde(default)]
    pub databases_for_migration: Vec<String>,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selections_from_partial_path() {
        let path = vec![
            ResourceRef::Account(AccountRef {
                id: "acct".to_string(),
                display_name: "user@contoso.com".to_string(),
            }),
            ResourceRef::Tenant(TenantRef {
                id: "tenant".to_string(),
                display_name: "Contoso".to_string(),
            }),
        ];
        let selections = SavedSelections::from_path(&path);
        assert_eq!(selections.azure_account.as_ref().map(|a| a.id.as_str()), Some("acct"));
        assert!(selections.subscription.is_none());

        let preferred = selections.preferred_ids();
        assert_eq!(
            preferred,
            vec![
                (StageId::Account, "acct".to_string()),
                (StageId::Tenant, "tenant".to_string())
            ]
        );
    }

    #[test]
    fn test_saved_info_flattens_selections() {
        let info = SavedInfo::new(ServerAssessment::default(), vec!["db1".to_string()]);
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("azure_account").is_some());
        assert_eq!(json["database_list"][0], "db1");
    }
}
