//! Host Registry — owns the configured fleet and vends per-host clients.
//!
//! Builds a [`crate::backend::BackendClient`] per configured host up front,
//! caching one client per host (there being only one backend protocol —
//! Ollama — but many hosts).

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{backend::BackendClient, config::Host};

/// Owns the fleet's host list and a cached [`BackendClient`] per host.
///
/// Hosts are immutable after construction ("Immutable after
/// config load"). Building a registry never touches the network.
pub struct HostRegistry {
    hosts: Vec<Host>,
    clients: HashMap<String, Arc<BackendClient>>,
}

impl HostRegistry {
    /// Build a registry from the configured hosts, eagerly constructing one
    /// client per host (client construction itself does no I/O).
    pub fn new(hosts: Vec<Host>, request_timeout: Duration) -> Self {
        let clients = hosts
            .iter()
            .map(|h| (h.name.clone(), Arc::new(BackendClient::new(h.url.clone(), request_timeout))))
            .collect();
        Self { hosts, clients }
    }

    /// All configured hosts, in the order they were declared.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Look up a configured host by name.
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// The cached client for a named host, if that host is configured.
    pub fn client(&self, name: &str) -> Option<Arc<BackendClient>> {
        self.clients.get(name).cloned()
    }
}
