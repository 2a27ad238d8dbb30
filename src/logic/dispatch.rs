use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use crate::logic::cascade::{FetchOutcome, FetchRequest, FetchedCandidates, StageQuery};
use crate::model::ResourceRef;
use crate::store::ResourceProvider;

/// Runs cascade fetches concurrently and hands their outcomes back in
/// completion order. Requests are never cancelled; the resolver discards
/// outcomes whose generation has moved on.
pub struct FetchDispatcher {
    provider: Arc<dyn ResourceProvider>,
    sender: mpsc::UnboundedSender<FetchOutcome>,
    receiver: mpsc::UnboundedReceiver<FetchOutcome>,
    in_flight: usize,
}

impl FetchDispatcher {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            provider,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, requests: Vec<FetchRequest>) {
        for request in requests {
            let provider = Arc::clone(&self.provider);
            let sender = self.sender.clone();
            self.in_flight += 1;

            tokio::spawn(async move {
                let FetchRequest {
                    stage,
                    generation,
                    query,
                } = request;
                log::debug!("Fetching {} candidates (generation {})", stage, generation);

                // A panicking provider still has to report back, or the
                // in-flight count never drains
                let query_task =
                    tokio::spawn(async move { run_query(provider.as_ref(), &query).await });
                let result = match query_task.await {
                    Ok(result) => result,
                    Err(e) => Err(anyhow!("{} lookup task failed: {}", stage, e)),
                };

                // The receiver only goes away with the session
                let _ = sender.send(FetchOutcome {
                    stage,
                    generation,
                    result,
                });
            });
        }
    }

    /// Wait for the next finished fetch. `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.receiver.recv().await?;
        self.in_flight -= 1;
        Some(outcome)
    }
}

impl std::fmt::Debug for FetchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchDispatcher")
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Resolve one stage query against the provider
pub async fn run_query(
    provider: &dyn ResourceProvider,
    query: &StageQuery,
) -> Result<FetchedCandidates> {
    let fetched = match query {
        StageQuery::Accounts => FetchedCandidates::resources(
            provider
                .list_accounts()
                .await?
                .into_iter()
                .map(ResourceRef::Account)
                .collect(),
        ),
        StageQuery::Tenants { account } => FetchedCandidates::resources(
            provider
                .list_tenants(account)
                .await?
                .into_iter()
                .map(ResourceRef::Tenant)
                .collect(),
        ),
        StageQuery::Subscriptions { account, tenant } => FetchedCandidates::resources(
            provider
                .list_subscriptions(account, tenant)
                .await?
                .into_iter()
                .map(ResourceRef::Subscription)
                .collect(),
        ),
        StageQuery::Locations {
            account,
            subscription,
            kind,
        } => {
            let target_servers = provider
                .list_target_servers(account, subscription, *kind)
                .await?;
            let locations = provider
                .list_locations(account, subscription, &target_servers)
                .await?;
            FetchedCandidates {
                resources: locations.into_iter().map(ResourceRef::Location).collect(),
                target_servers,
            }
        }
        StageQuery::ResourceGroups {
            candidates,
            location,
        } => FetchedCandidates::resources(
            provider
                .list_resource_groups(candidates, location)
                .await?
                .into_iter()
                .map(ResourceRef::ResourceGroup)
                .collect(),
        ),
        StageQuery::Instances {
            account,
            subscription,
            location,
            resource_group,
            kind,
        } => FetchedCandidates::resources(
            provider
                .list_instances(account, subscription, location, resource_group, *kind)
                .await?
                .into_iter()
                .map(ResourceRef::Instance)
                .collect(),
        ),
    };
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccountRef, InstanceRef, LocationRef, ResourceGroupRef, StageId, SubscriptionRef,
        TargetKind, TenantRef,
    };

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl ResourceProvider for PanickingProvider {
        async fn list_accounts(&self) -> Result<Vec<AccountRef>> {
            panic!("account lookup exploded");
        }

        async fn list_tenants(&self, _account: &AccountRef) -> Result<Vec<TenantRef>> {
            Ok(vec![TenantRef {
                id: "t1".to_string(),
                display_name: "Contoso".to_string(),
            }])
        }

        async fn list_subscriptions(
            &self,
            _account: &AccountRef,
            _tenant: &TenantRef,
        ) -> Result<Vec<SubscriptionRef>> {
            Ok(Vec::new())
        }

        async fn list_target_servers(
            &self,
            _account: &AccountRef,
            _subscription: &SubscriptionRef,
            _kind: TargetKind,
        ) -> Result<Vec<InstanceRef>> {
            Ok(Vec::new())
        }

        async fn list_locations(
            &self,
            _account: &AccountRef,
            _subscription: &SubscriptionRef,
            _candidates: &[InstanceRef],
        ) -> Result<Vec<LocationRef>> {
            Ok(Vec::new())
        }

        async fn list_instances(
            &self,
            _account: &AccountRef,
            _subscription: &SubscriptionRef,
            _location: &LocationRef,
            _resource_group: &ResourceGroupRef,
            _kind: TargetKind,
        ) -> Result<Vec<InstanceRef>> {
            Ok(Vec::new())
        }
    }

    fn account() -> AccountRef {
        AccountRef {
            id: "a".to_string(),
            display_name: "a@contoso.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_outcome_carries_generation() {
        let mut dispatcher = FetchDispatcher::new(Arc::new(PanickingProvider));
        dispatcher.dispatch(vec![FetchRequest {
            stage: StageId::Tenant,
            generation: 4,
            query: StageQuery::Tenants { account: account() },
        }]);
        assert_eq!(dispatcher.in_flight(), 1);

        let outcome = dispatcher.next_outcome().await.unwrap();
        assert_eq!(outcome.stage, StageId::Tenant);
        assert_eq!(outcome.generation, 4);
        assert_eq!(outcome.result.unwrap().resources.len(), 1);
        assert_eq!(dispatcher.in_flight(), 0);
        assert!(dispatcher.next_outcome().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_lookup_reports_failure() {
        let mut dispatcher = FetchDispatcher::new(Arc::new(PanickingProvider));
        dispatcher.dispatch(vec![FetchRequest {
            stage: StageId::Account,
            generation: 1,
            query: StageQuery::Accounts,
        }]);

        let outcome = dispatcher.next_outcome().await.unwrap();
        assert_eq!(outcome.stage, StageId::Account);
        assert!(outcome.result.is_err());
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
