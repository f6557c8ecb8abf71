//! Fleet Manager — probes every host, caches [`HostStatus`], answers
//! placement queries.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::ModelInfo;

use super::registry::HostRegistry;

/// Observed state of a single [`crate::config::Host`] at one instant.
///
/// Owned exclusively by the [`FleetManager`]; callers only ever see cloned
/// snapshots.
///
/// `name` is carried here because every consumer of a `HostStatus` —
/// `get_all_models`, a `RouteDecision`, the `hosts` tool — needs to know
/// which host produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostStatus {
    pub name: String,
    pub online: bool,
    pub latency: Duration,
    pub version: String,
    pub models: Vec<ModelInfo>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HostStatus {
    fn offline(name: &str, error: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            online: false,
            latency: Duration::ZERO,
            version: String::new(),
            models: Vec::new(),
            error,
            checked_at: Utc::now(),
        }
    }
}

/// Probes the fleet and caches results between calls.
pub struct FleetManager {
    registry: Arc<HostRegistry>,
    cache: tokio::sync::RwLock<HashMap<String, HostStatus>>,
}

impl FleetManager {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self { registry, cache: tokio::sync::RwLock::new(HashMap::new()) }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Probe a single host: version + model list + latency.
    ///
    /// Disabled hosts are never probed — returns `{online: false}` immediately.
    pub async fn check_host(&self, host: &crate::config::Host) -> HostStatus {
        if !host.enabled {
            return HostStatus::offline(&host.name, None);
        }

        let Some(client) = self.registry.client(&host.name) else {
            return HostStatus::offline(&host.name, Some("no client configured for host".into()));
        };

        let t0 = std::time::Instant::now();
        let models = match client.list_models().await {
            Ok(m) => m,
            Err(e) => {
                warn!(host = %host.name, error = %e, "host probe failed");
                return HostStatus::offline(&host.name, Some(e.to_string()));
            }
        };
        let version = client.version().await.unwrap_or_default();
        let latency = t0.elapsed();

        HostStatus {
            name: host.name.clone(),
            online: true,
            latency,
            version,
            models,
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// Fan out a [`check_host`][Self::check_host] probe across every
    /// configured host in parallel, await all, and return results in
    /// host-name order regardless of completion order.
    ///
    /// Updates the internal cache so subsequent [`get_host_with_model`],
    /// [`get_best_host`], and [`get_all_models`] calls see fresh data.
    ///
    /// [`get_host_with_model`]: Self::get_host_with_model
    /// [`get_best_host`]: Self::get_best_host
    /// [`get_all_models`]: Self::get_all_models
    pub async fn check_all_hosts(&self) -> Vec<HostStatus> {
        let hosts = self.registry.hosts().to_vec();
        let futures = hosts.iter().map(|h| self.check_host(h));
        let mut results = futures::future::join_all(futures).await;
        results.sort_by(|a, b| a.name.cmp(&b.name));

        let mut cache = self.cache.write().await;
        for status in &results {
            cache.insert(status.name.clone(), status.clone());
        }

        results
    }

    /// Among currently-cached online hosts carrying a model whose name
    /// equals or is prefixed by `model`, return the one with the smallest
    /// `(priority, latency)` tuple.
    pub async fn get_host_with_model(&self, model: &str) -> Option<HostStatus> {
        let cache = self.cache.read().await;
        self.registry
            .hosts()
            .iter()
            .filter_map(|h| cache.get(&h.name).map(|s| (h, s)))
            .filter(|(_, status)| status.online)
            .filter(|(_, status)| {
                status.models.iter().any(|m| m.name == model || m.name.starts_with(model))
            })
            .min_by(|(host_a, status_a), (host_b, status_b)| {
                (host_a.priority, status_a.latency).cmp(&(host_b.priority, status_b.latency))
            })
            .map(|(_, status)| status.clone())
    }

    /// Online host minimizing `(priority, latency)`.
    pub async fn get_best_host(&self) -> Option<HostStatus> {
        let cache = self.cache.read().await;
        self.registry
            .hosts()
            .iter()
            .filter_map(|h| cache.get(&h.name).map(|s| (h, s)))
            .filter(|(_, status)| status.online)
            .min_by(|(host_a, status_a), (host_b, status_b)| {
                (host_a.priority, status_a.latency).cmp(&(host_b.priority, status_b.latency))
            })
            .map(|(_, status)| status.clone())
    }

    /// Aggregate view: model name → host names currently carrying it.
    pub async fn get_all_models(&self) -> HashMap<String, Vec<String>> {
        let cache = self.cache.read().await;
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        let mut names: Vec<&String> = cache.keys().collect();
        names.sort();
        for name in names {
            let status = &cache[name];
            if !status.online {
                continue;
            }
            for model in &status.models {
                map.entry(model.name.clone()).or_default().push(status.name.clone());
            }
        }
        map
    }

    /// The last cached snapshot for one host, without probing.
    pub async fn cached(&self, name: &str) -> Option<HostStatus> {
        self.cache.read().await.get(name).cloned()
    }
}
