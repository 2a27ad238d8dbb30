use std::collections::HashMap;

use crate::error::CascadeError;
use crate::model::{
    AccountRef, Candidate, InstanceRef, LocationRef, ResourceGroupRef, ResourceRef, Stage,
    StageId, SubscriptionRef, TargetKind, TenantRef,
};

/// Remote lookup needed to (re)populate one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageQuery {
    Accounts,
    Tenants {
        account: AccountRef,
    },
    Subscriptions {
        account: AccountRef,
        tenant: TenantRef,
    },
    Locations {
        account: AccountRef,
        subscription: SubscriptionRef,
        kind: TargetKind,
    },
    ResourceGroups {
        candidates: Vec<InstanceRef>,
        location: LocationRef,
    },
    Instances {
        account: AccountRef,
        subscription: SubscriptionRef,
        location: LocationRef,
        resource_group: ResourceGroupRef,
        kind: TargetKind,
    },
}

/// A fetch the resolver wants issued, tagged with the stage generation it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub stage: StageId,
    pub generation: u64,
    pub query: StageQuery,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedCandidates {
    pub resources: Vec<ResourceRef>,
    /// Target servers the location list was computed from (location fetches only)
    pub target_servers: Vec<InstanceRef>,
}

impl FetchedCandidates {
    pub fn resources(resources: Vec<ResourceRef>) -> Self {
        Self {
            resources,
            target_servers: Vec::new(),
        }
    }
}

/// Result of a fetch, delivered back to the resolver
#[derive(Debug)]
pub struct FetchOutcome {
    pub stage: StageId,
    pub generation: u64,
    pub result: anyhow::Result<FetchedCandidates>,
}

#[derive(Debug, PartialEq)]
pub enum Completion {
    /// The outcome was current and applied; `follow_up` holds fetches
    /// triggered by an automatic selection
    Applied { follow_up: Vec<FetchRequest> },
    /// The stage was invalidated after this fetch was issued
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeOptions {
    /// Select the first real candidate once a stage settles
    pub auto_select: bool,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self { auto_select: true }
    }
}

/// Chain of dependent target selections (account -> ... -> instance).
///
/// Selecting a value invalidates every downstream stage and asks for the
/// next stage to be fetched. Each stage carries a generation counter and a
/// fetch outcome is applied only while its generation is still current,
/// so results of superseded lookups can never reach the candidate lists.
#[derive(Debug, Clone)]
pub struct CascadeResolver {
    stages: Vec<Stage>,
    target_kind: TargetKind,
    target_servers: Vec<InstanceRef>,
    preferred: HashMap<StageId, String>,
    options: CascadeOptions,
}

impl CascadeResolver {
    pub fn new(target_kind: TargetKind, options: CascadeOptions) -> Self {
        Self {
            stages: StageId::ALL.into_iter().map(Stage::new).collect(),
            target_kind,
            target_servers: Vec::new(),
            preferred: HashMap::new(),
            options,
        }
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.index()]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn target_kind(&self) -> TargetKind {
        self.target_kind
    }

    pub fn options(&self) -> CascadeOptions {
        self.options
    }

    /// Target servers behind the current location list
    pub fn target_servers(&self) -> &[InstanceRef] {
        &self.target_servers
    }

    pub fn is_settled(&self) -> bool {
        self.stages.iter().all(|stage| !stage.is_loading)
    }

    /// Choices to re-select automatically when they show up, e.g. when
    /// resuming a saved session. Matched on id or name, ignoring case.
    pub fn restore_preferred(&mut self, preferred: impl IntoIterator<Item = (StageId, String)>) {
        self.preferred.extend(preferred);
    }

    pub fn clear_preferred(&mut self) {
        self.preferred.clear();
    }

    /// Re-fetch the account list, invalidating the whole chain
    pub fn refresh_accounts(&mut self) -> Vec<FetchRequest> {
        // Accounts have no upstream, so this cannot fail
        self.refresh_stage(StageId::Account).unwrap_or_default()
    }

    /// Re-issue the fetch for `stage`, invalidating it and everything below
    pub fn refresh_stage(&mut self, stage: StageId) -> Result<Vec<FetchRequest>, CascadeError> {
        let query = self.query_for(stage)?;
        self.invalidate_from(stage);
        Ok(vec![self.request(stage, query)])
    }

    pub fn select_stage(
        &mut self,
        stage: StageId,
        candidate_id: &str,
    ) -> Result<Vec<FetchRequest>, CascadeError> {
        let current = self.stage(stage);
        if current.is_loading {
            return Err(CascadeError::StillLoading { stage });
        }
        if current.has_only_sentinel() {
            return Err(CascadeError::SentinelNotSelectable { stage });
        }
        let chosen = current
            .find_candidate(candidate_id)
            .cloned()
            .ok_or_else(|| CascadeError::UnknownCandidate {
                stage,
                candidate_id: candidate_id.to_string(),
            })?;

        log::debug!("{} selected: {}", stage, chosen.id());
        self.stages[stage.index()].selected = Some(chosen);

        let Some(next) = stage.next() else {
            return Ok(Vec::new());
        };
        self.invalidate_from(next);
        let query = self.query_for(next)?;
        Ok(vec![self.request(next, query)])
    }

    /// Change the target kind; locations and everything below depend on it
    pub fn set_target_kind(&mut self, kind: TargetKind) -> Vec<FetchRequest> {
        if kind == self.target_kind {
            return Vec::new();
        }
        self.target_kind = kind;

        match self.refresh_stage(StageId::Location) {
            Ok(requests) => requests,
            Err(_) => {
                // Nothing selected upstream yet; the location fetch is issued later
                self.invalidate_from(StageId::Location);
                self.settle_after(StageId::Subscription);
                Vec::new()
            }
        }
    }

    pub fn on_fetch_complete(&mut self, outcome: FetchOutcome) -> Completion {
        let FetchOutcome {
            stage,
            generation,
            result,
        } = outcome;

        let current = self.stage(stage).generation;
        if generation != current {
            log::debug!(
                "Discarding stale {} fetch (generation {}, current {})",
                stage,
                generation,
                current
            );
            return Completion::Discarded;
        }

        let kind = self.target_kind;
        let candidates = match result {
            Ok(fetched) => {
                if stage == StageId::Location {
                    self.target_servers = fetched.target_servers;
                }
                if fetched.resources.is_empty() {
                    vec![Candidate::not_found(stage, kind)]
                } else {
                    fetched
                        .resources
                        .into_iter()
                        .map(Candidate::Resource)
                        .collect()
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to load {} candidates (generation {}): {:#}",
                    stage,
                    generation,
                    e
                );
                vec![Candidate::not_found(stage, kind)]
            }
        };

        let entry = &mut self.stages[stage.index()];
        entry.candidates = candidates;
        entry.is_loading = false;

        let follow_up = match self.automatic_choice(stage) {
            Some(candidate_id) => self
                .select_stage(stage, &candidate_id)
                .unwrap_or_else(|e| {
                    log::warn!("Automatic {} selection failed: {}", stage, e);
                    Vec::new()
                }),
            None => {
                self.settle_after(stage);
                Vec::new()
            }
        };

        Completion::Applied { follow_up }
    }

    /// Selected values from the first stage down to the deepest selection
    pub fn current_selection_path(&self) -> Vec<&ResourceRef> {
        self.stages
            .iter()
            .map_while(|stage| stage.selected.as_ref())
            .collect()
    }

    fn automatic_choice(&mut self, stage: StageId) -> Option<String> {
        let restored = self.preferred.get(&stage).and_then(|key| {
            self.stage(stage)
                .real_candidates()
                .find(|r| r.matches(key))
                .map(|r| r.id().to_string())
        });
        if let Some(id) = restored {
            self.preferred.remove(&stage);
            return Some(id);
        }

        if self.options.auto_select {
            return self
                .stage(stage)
                .real_candidates()
                .next()
                .map(|r| r.id().to_string());
        }
        None
    }

    /// Downstream stages of a settled stage without a selection stop loading.
    /// Below an unresolved ("not found") stage nothing can be found either.
    fn settle_after(&mut self, stage: StageId) {
        let unresolved = self.stage(stage).has_only_sentinel();
        let kind = self.target_kind;

        for downstream in &mut self.stages[stage.index() + 1..] {
            downstream.is_loading = false;
            downstream.selected = None;
            downstream.candidates = if unresolved {
                vec![Candidate::not_found(downstream.id, kind)]
            } else {
                Vec::new()
            };
        }
    }

    fn invalidate_from(&mut self, stage: StageId) {
        if stage <= StageId::Location {
            self.target_servers.clear();
        }
        for entry in &mut self.stages[stage.index()..] {
            entry.invalidate();
        }
    }

    fn request(&self, stage: StageId, query: StageQuery) -> FetchRequest {
        FetchRequest {
            stage,
            generation: self.stage(stage).generation,
            query,
        }
    }

    fn upstream<T: Clone>(
        &self,
        stage: StageId,
        upstream: StageId,
        pick: impl Fn(&ResourceRef) -> Option<&T>,
    ) -> Result<T, CascadeError> {
        self.stage(upstream)
            .selected
            .as_ref()
            .and_then(pick)
            .cloned()
            .ok_or(CascadeError::UpstreamNotSelected { stage, upstream })
    }

    fn query_for(&self, stage: StageId) -> Result<StageQuery, CascadeError> {
        let kind = self.target_kind;
        let account = || self.upstream(stage, StageId::Account, ResourceRef::as_account);
        let subscription =
            || self.upstream(stage, StageId::Subscription, ResourceRef::as_subscription);

        Ok(match stage {
            StageId::Account => StageQuery::Accounts,
            StageId::Tenant => StageQuery::Tenants { account: account()? },
            StageId::Subscription => StageQuery::Subscriptions {
                account: account()?,
                tenant: self.upstream(stage, StageId::Tenant, ResourceRef::as_tenant)?,
            },
            StageId::Location => StageQuery::Locations {
                account: account()?,
                subscription: subscription()?,
                kind,
            },
            StageId::ResourceGroup => StageQuery::ResourceGroups {
                candidates: self.target_servers.clone(),
                location: self.upstream(stage, StageId::Location, ResourceRef::as_location)?,
            },
            StageId::Instance => StageQuery::Instances {
                account: account()?,
                subscription: subscription()?,
                location: self.upstream(stage, StageId::Location, ResourceRef::as_location)?,
                resource_group: self.upstream(
                    stage,
                    StageId::ResourceGroup,
                    ResourceRef::as_resource_group,
                )?,
                kind,
            },
        })
    }
}
