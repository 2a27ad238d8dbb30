use crate::model::{same_name, Id, TargetKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: Id,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRef {
    pub id: Id,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRef {
    pub id: Id,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Id>,
}

/// Azure region. `id` is the short region name (`westeurope`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroupRef {
    /// Full id: `/subscriptions/{sub}/resourceGroups/{name}`
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Id>,
}

/// Kind-specific state of a migration target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InstanceDetails {
    ManagedInstance {
        state: String,
    },
    VirtualMachine {
        /// Instance-view status code, e.g. `PowerState/running`
        power_state: String,
        /// SQL IaaS extension management mode
        sql_management: String,
    },
    SqlDatabaseServer {
        state: String,
        #[serde(default)]
        administrator_login: String,
        #[serde(default)]
        fully_qualified_domain_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRef {
    /// Full ARM resource id
    pub id: Id,
    pub name: String,
    pub location: String,
    pub details: InstanceDetails,
}

impl InstanceRef {
    pub fn kind(&self) -> TargetKind {
        match self.details {
            InstanceDetails::ManagedInstance { .. } => TargetKind::ManagedInstance,
            InstanceDetails::VirtualMachine { .. } => TargetKind::VirtualMachine,
            InstanceDetails::SqlDatabaseServer { .. } => TargetKind::SqlDatabaseServer,
        }
    }

    pub fn is_ready(&self) -> bool {
        match &self.details {
            InstanceDetails::ManagedInstance { state }
            | InstanceDetails::SqlDatabaseServer { state, .. } => same_name(state, "Ready"),
            InstanceDetails::VirtualMachine {
                power_state,
                sql_management,
            } => same_name(power_state, "PowerState/running") && same_name(sql_management, "Full"),
        }
    }

    /// Name shown in the target dropdown; unready targets stay listed but are flagged
    pub fn label(&self) -> String {
        if self.is_ready() {
            self.name.clone()
        } else {
            format!("(Unavailable) {}", self.name)
        }
    }

    pub fn resource_group(&self) -> Option<&str> {
        resource_group_from_id(&self.id)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        subscription_from_id(&self.id)
    }

    /// Default login name for database-server targets
    pub fn administrator_login(&self) -> Option<&str> {
        match &self.details {
            InstanceDetails::SqlDatabaseServer {
                administrator_login,
                ..
            } if !administrator_login.is_empty() => Some(administrator_login),
            _ => None,
        }
    }
}

/// A candidate value for one cascade stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceRef {
    Account(AccountRef),
    Tenant(TenantRef),
    Subscription(SubscriptionRef),
    Location(LocationRef),
    ResourceGroup(ResourceGroupRef),
    Instance(InstanceRef),
}

impl ResourceRef {
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Account(r) => &r.id,
            ResourceRef::Tenant(r) => &r.id,
            ResourceRef::Subscription(r) => &r.id,
            ResourceRef::Location(r) => &r.id,
            ResourceRef::ResourceGroup(r) => &r.id,
            ResourceRef::Instance(r) => &r.id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            ResourceRef::Account(r) => r.display_name.clone(),
            ResourceRef::Tenant(r) => r.display_name.clone(),
            ResourceRef::Subscription(r) => r.display_name.clone(),
            ResourceRef::Location(r) => r.display_name.clone(),
            ResourceRef::ResourceGroup(r) => r.name.clone(),
            ResourceRef::Instance(r) => r.label(),
        }
    }

    /// Match used when restoring a saved choice: id or plain name, ignoring case
    pub fn matches(&self, key: &str) -> bool {
        let name = match self {
            ResourceRef::Instance(r) => r.name.clone(),
            other => other.display_name(),
        };
        same_name(self.id(), key) || same_name(&name, key)
    }

    pub fn as_account(&self) -> Option<&AccountRef> {
        match self {
            ResourceRef::Account(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_tenant(&self) -> Option<&TenantRef> {
        match self {
            ResourceRef::Tenant(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_subscription(&self) -> Option<&SubscriptionRef> {
        match self {
            ResourceRef::Subscription(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&LocationRef> {
        match self {
            ResourceRef::Location(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resource_group(&self) -> Option<&ResourceGroupRef> {
        match self {
            ResourceRef::ResourceGroup(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            ResourceRef::Instance(r) => Some(r),
            _ => None,
        }
    }
}

fn id_segment<'a>(resource_id: &'a str, key: &str) -> Option<&'a str> {
    let mut parts = resource_id.split('/');
    while let Some(part) = parts.next() {
        if same_name(part, key) {
            return parts.next().filter(|segment| !segment.is_empty());
        }
    }
    None
}

/// `/subscriptions/s/resourceGroups/rg/providers/...` -> `rg`
pub fn resource_group_from_id(resource_id: &str) -> Option<&str> {
    id_segment(resource_id, "resourceGroups")
}

pub fn subscription_from_id(resource_id: &str) -> Option<&str> {
    id_segment(resource_id, "subscriptions")
}

/// `/subscriptions/s/resourceGroups/rg/providers/...` -> `/subscriptions/s/resourceGroups/rg`
pub fn full_resource_group_id(resource_id: &str) -> Option<String> {
    let subscription = subscription_from_id(resource_id)?;
    let group = resource_group_from_id(resource_id)?;
    Some(format!(
        "/subscriptions/{}/resourceGroups/{}",
        subscription, group
    ))
}
