use std::path::Path;

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{
    same_name, AccountRef, InstanceRef, LocationRef, ResourceGroupRef, SubscriptionRef,
    TargetKind, TenantRef,
};
use crate::store::traits::{instances_in_group, ResourceProvider};

/// Linked accounts and everything they can see, as stored in the catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCatalog {
    #[serde(default)]
    pub accounts: Vec<CatalogAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAccount {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub tenants: Vec<CatalogTenant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTenant {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub subscriptions: Vec<CatalogSubscription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSubscription {
    pub id: String,
    pub display_name: String,
    /// Region display names; regions missing here are shown by their short name
    #[serde(default)]
    pub locations: Vec<LocationRef>,
    #[serde(default)]
    pub instances: Vec<InstanceRef>,
}

/// Resource provider answering from a static JSON catalog
#[derive(Debug, Clone)]
pub struct CatalogResourceProvider {
    catalog: ResourceCatalog,
}

impl CatalogResourceProvider {
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self { catalog }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read resource catalog {}", path.display()))?;
        let catalog: ResourceCatalog = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid resource catalog {}", path.display()))?;

        log::info!(
            "Loaded resource catalog {} ({} accounts)",
            path.display(),
            catalog.accounts.len()
        );
        Ok(Self::new(catalog))
    }

    fn account(&self, account: &AccountRef) -> Result<&CatalogAccount> {
        self.catalog
            .accounts
            .iter()
            .find(|a| same_name(&a.id, &account.id))
            .ok_or_else(|| anyhow!("Account '{}' is not linked", account.id))
    }

    fn subscription(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
    ) -> Result<&CatalogSubscription> {
        self.account(account)?
            .tenants
            .iter()
            .flat_map(|t| t.subscriptions.iter())
            .find(|s| same_name(&s.id, &subscription.id))
            .ok_or_else(|| {
                anyhow!(
                    "Subscription '{}' is not visible to account '{}'",
                    subscription.id,
                    account.id
                )
            })
    }
}

#[async_trait::async_trait]
impl ResourceProvider for CatalogResourceProvider {
    async fn list_accounts(&self) -> Result<Vec<AccountRef>> {
        Ok(self
            .catalog
            .accounts
            .iter()
            .map(|a| AccountRef {
                id: a.id.clone(),
                display_name: a.display_name.clone(),
            })
            .collect())
    }

    async fn list_tenants(&self, account: &AccountRef) -> Result<Vec<TenantRef>> {
        Ok(self
            .account(account)?
            .tenants
            .iter()
            .map(|t| TenantRef {
                id: t.id.clone(),
                display_name: t.display_name.clone(),
            })
            .collect())
    }

    async fn list_subscriptions(
        &self,
        account: &AccountRef,
        tenant: &TenantRef,
    ) -> Result<Vec<SubscriptionRef>> {
        let tenant = self
            .account(account)?
            .tenants
            .iter()
            .find(|t| same_name(&t.id, &tenant.id))
            .ok_or_else(|| anyhow!("Tenant '{}' not found for '{}'", tenant.id, account.id))?;

        Ok(tenant
            .subscriptions
            .iter()
            .map(|s| SubscriptionRef {
                id: s.id.clone(),
                display_name: s.display_name.clone(),
                tenant_id: Some(tenant.id.clone()),
            })
            .collect())
    }

    async fn list_target_servers(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>> {
        Ok(self
            .subscription(account, subscription)?
            .instances
            .iter()
            .filter(|i| i.kind() == kind)
            .cloned()
            .collect())
    }

    async fn list_locations(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        candidates: &[InstanceRef],
    ) -> Result<Vec<LocationRef>> {
        let known = &self.subscription(account, subscription)?.locations;

        Ok(candidates
            .iter()
            .map(|instance| instance.location.as_str())
            .unique_by(|name| name.to_lowercase())
            .map(|name| {
                known
                    .iter()
                    .find(|l| same_name(&l.id, name))
                    .cloned()
                    .unwrap_or_else(|| LocationRef {
                        id: name.to_string(),
                        display_name: name.to_string(),
                    })
            })
            .sorted_by(|a, b| a.display_name.cmp(&b.display_name))
            .collect())
    }

    async fn list_instances(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        location: &LocationRef,
        resource_group: &ResourceGroupRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>> {
        let servers = self
            .list_target_servers(account, subscription, kind)
            .await?;
        Ok(instances_in_group(&servers, location, resource_group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceDetails;
    use serde_json::json;

    fn catalog() -> ResourceCatalog {
        serde_json::from_value(json!({
            "accounts": [{
                "id": "acct-1",
                "display_name": "dba@contoso.com",
                "tenants": [{
                    "id": "tenant-1",
                    "display_name": "Contoso",
                    "subscriptions": [{
                        "id": "sub-1",
                        "display_name": "Production",
                        "locations": [
                            { "id": "westeurope", "display_name": "West Europe" },
                            { "id": "eastus", "display_name": "East US" }
                        ],
                        "instances": [
                            {
                                "id": "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Sql/managedInstances/mi1",
                                "name": "mi1",
                                "location": "westeurope",
                                "details": { "kind": "ManagedInstance", "state": "Ready" }
                            },
                            {
                                "id": "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Sql/managedInstances/mi2",
                                "name": "mi2",
                                "location": "WestEurope",
                                "details": { "kind": "ManagedInstance", "state": "Stopped" }
                            },
                            {
                                "id": "/subscriptions/sub-1/resourceGroups/rg-vm/providers/Microsoft.SqlVirtualMachine/sqlVirtualMachines/vm1",
                                "name": "vm1",
                                "location": "eastus",
                                "details": {
                                    "kind": "VirtualMachine",
                                    "power_state": "PowerState/running",
                                    "sql_management": "Full"
                                }
                            }
                        ]
                    }]
                }]
            }]
        }))
        .unwrap()
    }

    fn account() -> AccountRef {
        AccountRef {
            id: "acct-1".to_string(),
            display_name: "dba@contoso.com".to_string(),
        }
    }

    fn subscription() -> SubscriptionRef {
        SubscriptionRef {
            id: "sub-1".to_string(),
            display_name: "Production".to_string(),
            tenant_id: None,
        }
    }

    #[tokio::test]
    async fn test_walks_account_to_subscription() {
        let provider = CatalogResourceProvider::new(catalog());

        let accounts = provider.list_accounts().await.unwrap();
        assert_eq!(accounts, vec![account()]);

        let tenants = provider.list_tenants(&account()).await.unwrap();
        assert_eq!(tenants[0].display_name, "Contoso");

        let subscriptions = provider
            .list_subscriptions(&account(), &tenants[0])
            .await
            .unwrap();
        assert_eq!(subscriptions[0].tenant_id.as_deref(), Some("tenant-1"));
    }

    #[tokio::test]
    async fn test_locations_only_where_targets_live() {
        let provider = CatalogResourceProvider::new(catalog());
        let servers = provider
            .list_target_servers(&account(), &subscription(), TargetKind::ManagedInstance)
            .await
            .unwrap();
        assert_eq!(servers.len(), 2);

        let locations = provider
            .list_locations(&account(), &subscription(), &servers)
            .await
            .unwrap();
        assert_eq!(
            locations,
            vec![LocationRef {
                id: "westeurope".to_string(),
                display_name: "West Europe".to_string()
            }]
        );

        let groups = provider
            .list_resource_groups(&servers, &locations[0])
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "rg-app");

        let instances = provider
            .list_instances(
                &account(),
                &subscription(),
                &locations[0],
                &groups[0],
                TargetKind::ManagedInstance,
            )
            .await
            .unwrap();
        let labels: Vec<String> = instances.iter().map(InstanceRef::label).collect();
        assert_eq!(labels, vec!["mi1", "(Unavailable) mi2"]);
    }

    #[tokio::test]
    async fn test_unknown_account_is_an_error() {
        let provider = CatalogResourceProvider::new(catalog());
        let stranger = AccountRef {
            id: "other".to_string(),
            display_name: "other".to_string(),
        };
        assert!(provider.list_tenants(&stranger).await.is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        std::fs::write(&path, serde_json::to_vec(&catalog()).unwrap()).unwrap();

        let provider = CatalogResourceProvider::load(&path).await.unwrap();
        let vm_servers = provider
            .list_target_servers(&account(), &subscription(), TargetKind::VirtualMachine)
            .await
            .unwrap();
        assert_eq!(vm_servers.len(), 1);
        assert!(matches!(
            vm_servers[0].details,
            InstanceDetails::VirtualMachine { .. }
        ));

        assert!(CatalogResourceProvider::load(dir.path().join("missing.json"))
            .await
            .is_err());
    }
}
