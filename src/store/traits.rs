use crate::model::{
    full_resource_group_id, same_name, subscription_from_id, AccountRef, InstanceRef, LocationRef,
    ResourceGroupRef, SubscriptionRef, TargetKind, TenantRef,
};
use anyhow::Result;
use itertools::Itertools;

/// Cloud resource lookups behind the target-selection cascade.
/// Every call may fail; the cascade turns failures into a "not found" entry.
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<AccountRef>>;

    async fn list_tenants(&self, account: &AccountRef) -> Result<Vec<TenantRef>>;

    async fn list_subscriptions(
        &self,
        account: &AccountRef,
        tenant: &TenantRef,
    ) -> Result<Vec<SubscriptionRef>>;

    /// All migration targets of `kind` in a subscription, in any location
    async fn list_target_servers(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>>;

    /// Locations hosting at least one of `candidates`, sorted by display name
    async fn list_locations(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        candidates: &[InstanceRef],
    ) -> Result<Vec<LocationRef>>;

    /// Resource groups of `candidates` in `location`, derived from their ids
    async fn list_resource_groups(
        &self,
        candidates: &[InstanceRef],
        location: &LocationRef,
    ) -> Result<Vec<ResourceGroupRef>> {
        Ok(resource_groups_by_location(candidates, location))
    }

    async fn list_instances(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        location: &LocationRef,
        resource_group: &ResourceGroupRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>>;

    /// Forget memoized lookups, e.g. after the user links another account
    fn invalidate_cache(&self) {}
}

pub fn resource_groups_by_location(
    candidates: &[InstanceRef],
    location: &LocationRef,
) -> Vec<ResourceGroupRef> {
    candidates
        .iter()
        .filter(|instance| same_name(&instance.location, &location.id))
        .filter_map(|instance| {
            Some(ResourceGroupRef {
                id: full_resource_group_id(&instance.id)?,
                name: instance.resource_group()?.to_string(),
                subscription_id: subscription_from_id(&instance.id).map(str::to_string),
            })
        })
        .unique_by(|group| group.id.to_lowercase())
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect()
}

/// Targets of a subscription narrowed to one location and resource group
pub fn instances_in_group(
    candidates: &[InstanceRef],
    location: &LocationRef,
    resource_group: &ResourceGroupRef,
) -> Vec<InstanceRef> {
    candidates
        .iter()
        .filter(|instance| {
            same_name(&instance.location, &location.id)
                && instance
                    .resource_group()
                    .is_some_and(|group| same_name(group, &resource_group.name))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceDetails;

    fn managed_instance(name: &str, group: &str, location: &str) -> InstanceRef {
        InstanceRef {
            id: format!(
                "/subscriptions/sub-1/resourceGroups/{}/providers/Microsoft.Sql/managedInstances/{}",
                group, name
            ),
            name: name.to_string(),
            location: location.to_string(),
            details: InstanceDetails::ManagedInstance {
                state: "Ready".to_string(),
            },
        }
    }

    fn west_europe() -> LocationRef {
        LocationRef {
            id: "westeurope".to_string(),
            display_name: "West Europe".to_string(),
        }
    }

    #[test]
    fn test_resource_groups_are_derived_deduplicated_and_sorted() {
        let candidates = vec![
            managed_instance("mi1", "rg-zeta", "westeurope"),
            managed_instance("mi2", "rg-alpha", "WestEurope"),
            managed_instance("mi3", "RG-ALPHA", "westeurope"),
            managed_instance("mi4", "rg-other", "eastus"),
        ];

        let groups = resource_groups_by_location(&candidates, &west_europe());
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["rg-alpha", "rg-zeta"]);
        assert_eq!(groups[0].subscription_id.as_deref(), Some("sub-1"));
        assert_eq!(groups[0].id, "/subscriptions/sub-1/resourceGroups/rg-alpha");
    }

    #[test]
    fn test_instances_in_group_matches_location_and_group() {
        let candidates = vec![
            managed_instance("mi1", "rg-app", "westeurope"),
            managed_instance("mi2", "rg-app", "eastus"),
            managed_instance("mi3", "rg-data", "westeurope"),
        ];
        let group = ResourceGroupRef {
            id: "/subscriptions/sub-1/resourceGroups/rg-app".to_string(),
            name: "RG-APP".to_string(),
            subscription_id: None,
        };

        let found = instances_in_group(&candidates, &west_europe(), &group);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "mi1");
    }
}
