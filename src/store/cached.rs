use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::model::{
    AccountRef, InstanceRef, LocationRef, ResourceGroupRef, SubscriptionRef, TargetKind,
    TenantRef,
};
use crate::store::traits::ResourceProvider;
use crate::store::ttl_cache::TtlCache;

/// Wraps a provider and memoizes the linked-account list, which every new
/// wizard session asks for and which rarely changes.
pub struct CachedResourceProvider<P> {
    inner: Arc<P>,
    accounts: TtlCache<(), Vec<AccountRef>>,
}

impl<P: ResourceProvider + 'static> CachedResourceProvider<P> {
    pub fn new(inner: P, ttl: Duration, single_flight: bool) -> Self {
        let inner = Arc::new(inner);
        let source = Arc::clone(&inner);
        let accounts = TtlCache::new(ttl, move |_: ()| {
            let source = Arc::clone(&source);
            async move { source.list_accounts().await }
        });

        Self {
            inner,
            accounts: if single_flight {
                accounts.with_single_flight()
            } else {
                accounts
            },
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<P: ResourceProvider + 'static> ResourceProvider for CachedResourceProvider<P> {
    async fn list_accounts(&self) -> Result<Vec<AccountRef>> {
        self.accounts.get_data(()).await
    }

    async fn list_tenants(&self, account: &AccountRef) -> Result<Vec<TenantRef>> {
        self.inner.list_tenants(account).await
    }

    async fn list_subscriptions(
        &self,
        account: &AccountRef,
        tenant: &TenantRef,
    ) -> Result<Vec<SubscriptionRef>> {
        self.inner.list_subscriptions(account, tenant).await
    }

    async fn list_target_servers(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>> {
        self.inner
            .list_target_servers(account, subscription, kind)
            .await
    }

    async fn list_locations(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        candidates: &[InstanceRef],
    ) -> Result<Vec<LocationRef>> {
        self.inner
            .list_locations(account, subscription, candidates)
            .await
    }

    async fn list_resource_groups(
        &self,
        candidates: &[InstanceRef],
        location: &LocationRef,
    ) -> Result<Vec<ResourceGroupRef>> {
        self.inner.list_resource_groups(candidates, location).await
    }

    async fn list_instances(
        &self,
        account: &AccountRef,
        subscription: &SubscriptionRef,
        location: &LocationRef,
        resource_group: &ResourceGroupRef,
        kind: TargetKind,
    ) -> Result<Vec<InstanceRef>> {
        self.inner
            .list_instances(account, subscription, location, resource_group, kind)
            .await
    }

    fn invalidate_cache(&self) {
        log::debug!("Dropping cached account list");
        self.accounts.reset_cache();
        self.inner.invalidate_cache();
    }
}
