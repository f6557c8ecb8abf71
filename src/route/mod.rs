//! Router — turns a query into a concrete (host, model) placement.
//!
//! Classify, resolve, place, and — on a miss — escalate through
//! progressively less specific placements rather than failing outright.

use std::sync::Arc;

use crate::{
    backend::BackendClient,
    classify::{self, Tier},
    config::Config,
    fleet::{FleetManager, HostStatus},
};

/// The outcome of routing one query: which tier it landed in, which model
/// was selected, and — if one was reachable — the host and client to call
/// it on.
///
/// `host`/`client` are `None` rather than an error when no host in the fleet
/// can serve `model`: placement is always a reported outcome, never a hard
/// failure, so `tier`/`confidence`/`model` stay meaningful even when nothing
/// was reachable to carry them out.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub tier: Tier,
    pub confidence: f64,
    pub model: String,
    pub host: Option<HostStatus>,
    pub client: Option<Arc<BackendClient>>,
    /// True when placement fell back past the tier's primary/fallback model
    /// onto whatever the best-reachable host happened to be carrying.
    pub escalated: bool,
}

/// Routes queries to a concrete host/model using the current config and the
/// fleet's live state.
pub struct Router {
    config: Arc<Config>,
    fleet: Arc<FleetManager>,
}

impl Router {
    pub fn new(config: Arc<Config>, fleet: Arc<FleetManager>) -> Self {
        Self { config, fleet }
    }

    /// Route `query`, optionally pinning the tier, model, and/or host
    /// explicitly. `force_tier`/`force_model` bypass classification and/or
    /// tier→model resolution but still go through placement; `force_host`
    /// skips placement entirely and binds to that host's cached status
    /// (probing it first if the cache is cold).
    pub async fn route(
        &self,
        query: &str,
        force_tier: Option<Tier>,
        force_model: Option<&str>,
        force_host: Option<&str>,
    ) -> RouteDecision {
        let (tier, confidence) = match force_tier {
            Some(tier) => (tier, 1.0),
            None => classify::classify(query),
        };

        let tier_entry = self.config.tiers.get(tier);
        let primary = force_model
            .map(|m| self.config.resolve_alias(m).to_string())
            .unwrap_or_else(|| tier_entry.primary_model.clone());

        if let Some(host_name) = force_host {
            let host = self.resolve_forced_host(host_name).await;
            return self.decision(tier, confidence, primary, host, false);
        }

        if let Some(host) = self.fleet.get_host_with_model(&primary).await {
            return self.decision(tier, confidence, primary, Some(host), false);
        }

        if self.config.routing.fallback {
            if let Some(fallback_model) = &tier_entry.fallback_model {
                if let Some(host) = self.fleet.get_host_with_model(fallback_model).await {
                    return self.decision(tier, confidence, fallback_model.clone(), Some(host), true);
                }
            }

            if let Some(host) = self.fleet.get_best_host().await {
                let model = host.models.first().map(|m| m.name.clone()).unwrap_or_else(|| primary.clone());
                return self.decision(tier, confidence, model, Some(host), true);
            }
        }

        self.decision(tier, confidence, primary, None, false)
    }

    /// Resolve `force_host` against the cache, probing it directly if the
    /// cache has no entry yet.
    async fn resolve_forced_host(&self, host_name: &str) -> Option<HostStatus> {
        if let Some(status) = self.fleet.cached(host_name).await {
            return Some(status);
        }
        let host_cfg = self.fleet.registry().host(host_name)?;
        Some(self.fleet.check_host(host_cfg).await)
    }

    fn decision(
        &self,
        tier: Tier,
        confidence: f64,
        model: String,
        host: Option<HostStatus>,
        escalated: bool,
    ) -> RouteDecision {
        let client = host.as_ref().and_then(|h| self.fleet.registry().client(&h.name));
        RouteDecision { tier, confidence, model, host, client, escalated }
    }
}
