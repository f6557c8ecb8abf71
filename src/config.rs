//! Configuration types for the fleet orchestrator.
//!
//! Config is loaded once at startup from a TOML file and validated before any
//! host is probed. Invalid configs are rejected with a clear error rather than
//! silently falling back to defaults — never start on a config we can't
//! trust.
//!
//! # Example
//! ```toml
//! [server]
//! port = 8090
//!
//! [[hosts]]
//! name = "workstation"
//! url  = "http://192.168.1.10:11434"
//! priority = 0
//!
//! [[hosts]]
//! name = "laptop"
//! url  = "http://192.168.1.20:11434"
//! priority = 1
//!
//! [tiers.fast]
//! primary_model  = "qwen2.5:1.5b"
//!
//! [tiers.deep]
//! primary_model  = "qwen2.5-coder:14b"
//! fallback_model = "qwen2.5-coder:7b"
//!
//! [tiers.analysis]
//! primary_model = "llama3.1:8b"
//!
//! [tiers.writing]
//! primary_model = "llama3.1:8b"
//!
//! [registry]
//! science  = "llama3.1:8b"
//! math     = "qwen2.5-coder:14b"
//! code     = "qwen2.5-coder:14b"
//! creative = "llama3.1:8b"
//! ```

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classify::Tier;

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// The fleet — all configured backend hosts.
    #[serde(default)]
    pub hosts: Vec<Host>,

    /// Tier → (primary model, fallback model) table.
    pub tiers: TierTable,

    /// Alias → concrete model name, used by the Inception Stream Processor
    /// to resolve `<sub-query model="ALIAS">` tags.
    #[serde(default)]
    pub registry: HashMap<String, String>,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub inception: InceptionConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            anyhow::ensure!(!host.name.is_empty(), "a [[hosts]] entry has an empty name");
            anyhow::ensure!(
                seen.insert(host.name.as_str()),
                "duplicate host name `{}`",
                host.name
            );
        }

        anyhow::ensure!(
            self.inception.max_depth_is_sane(),
            "inception.max_depth must be representable — got {}",
            self.inception.max_depth
        );
        anyhow::ensure!(
            self.inception.partial_tag_buffer_max_bytes > 0,
            "inception.partial_tag_buffer_max_bytes must be positive"
        );

        Ok(())
    }

    /// Resolve an alias through `registry`, falling back to treating `alias`
    /// itself as a literal model name.
    pub fn resolve_alias<'a>(&'a self, alias: &'a str) -> &'a str {
        self.registry.get(alias).map(String::as_str).unwrap_or(alias)
    }
}

/// HTTP surface for the Tool Server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: defaults::port() }
    }
}

/// A single configured backend host. Immutable after config load.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Host {
    /// Unique name used as the fleet-wide identity for this host.
    pub name: String,
    /// Base URL of the Ollama-style HTTP server, e.g. `http://host:11434`.
    pub url: String,
    /// Lower is better. Used as the primary key of the `(priority, latency)`
    /// lexicographic ordering in host selection.
    #[serde(default)]
    pub priority: u32,
    /// Disabled hosts are never probed and never selected.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
}

/// Tier → model table. One entry per fixed tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierTable {
    pub fast: TierEntry,
    pub deep: TierEntry,
    pub analysis: TierEntry,
    pub writing: TierEntry,
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> &TierEntry {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Deep => &self.deep,
            Tier::Analysis => &self.analysis,
            Tier::Writing => &self.writing,
        }
    }
}

/// A single tier's primary and optional fallback model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierEntry {
    pub primary_model: String,
    #[serde(default)]
    pub fallback_model: Option<String>,
}

/// Routing behavior flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// When true, the Router retries with the tier's fallback model on a
    /// failed placement, and finally falls back to `BestOnline()`.
    #[serde(default = "defaults::fallback")]
    pub fallback: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { fallback: defaults::fallback() }
    }
}

/// Inception Stream Processor tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InceptionConfig {
    /// Maximum nesting depth for sub-queries triggered by sub-queries.
    #[serde(default = "defaults::max_depth")]
    pub max_depth: u32,
    /// Timeout applied to each individual sub-query call.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    /// Safety valve: a held (possibly-partial-tag) buffer larger than this is
    /// flushed unchanged rather than held indefinitely.
    #[serde(default = "defaults::partial_tag_buffer_max_bytes")]
    pub partial_tag_buffer_max_bytes: usize,
}

impl InceptionConfig {
    fn max_depth_is_sane(&self) -> bool {
        self.max_depth < u32::MAX
    }
}

impl Default for InceptionConfig {
    fn default() -> Self {
        Self {
            max_depth: defaults::max_depth(),
            timeout_secs: defaults::timeout_secs(),
            partial_tag_buffer_max_bytes: defaults::partial_tag_buffer_max_bytes(),
        }
    }
}

mod defaults {
    pub fn port() -> u16 { 8090 }
    pub fn enabled() -> bool { true }
    pub fn fallback() -> bool { true }
    pub fn max_depth() -> u32 { 1 }
    pub fn timeout_secs() -> u64 { 60 }
    pub fn partial_tag_buffer_max_bytes() -> usize { 4096 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        [[hosts]]
        name = "workstation"
        url  = "http://localhost:11434"

        [[hosts]]
        name = "laptop"
        url  = "http://localhost:11435"
        priority = 1
        enabled = false

        [tiers.fast]
        primary_model = "qwen2.5:1.5b"

        [tiers.deep]
        primary_model  = "qwen2.5-coder:14b"
        fallback_model = "qwen2.5-coder:7b"

        [tiers.analysis]
        primary_model = "llama3.1:8b"

        [tiers.writing]
        primary_model = "llama3.1:8b"

        [registry]
        science = "llama3.1:8b"
        "#
    }

    fn minimal_config() -> Config {
        toml::from_str(minimal_toml()).expect("minimal config should parse")
    }

    #[test]
    fn parses_minimal_config() {
        let config = minimal_config();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.hosts[0].priority, 0);
        assert!(config.hosts[0].enabled);
        assert!(!config.hosts[1].enabled);
    }

    #[test]
    fn tier_table_get_returns_correct_entry() {
        let config = minimal_config();
        assert_eq!(config.tiers.get(Tier::Fast).primary_model, "qwen2.5:1.5b");
        assert_eq!(
            config.tiers.get(Tier::Deep).fallback_model.as_deref(),
            Some("qwen2.5-coder:7b")
        );
        assert!(config.tiers.get(Tier::Analysis).fallback_model.is_none());
    }

    #[test]
    fn defaults_apply_when_sections_are_minimal() {
        let config = minimal_config();
        assert_eq!(config.server.port, 8090);
        assert!(config.routing.fallback);
        assert_eq!(config.inception.max_depth, 1);
        assert_eq!(config.inception.timeout_secs, 60);
        assert_eq!(config.inception.partial_tag_buffer_max_bytes, 4096);
    }

    #[test]
    fn validation_rejects_duplicate_host_names() {
        let mut config = minimal_config();
        config.hosts.push(Host {
            name: "workstation".into(),
            url: "http://localhost:19999".into(),
            priority: 9,
            enabled: true,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_alias_follows_registry() {
        let config = minimal_config();
        assert_eq!(config.resolve_alias("science"), "llama3.1:8b");
    }

    #[test]
    fn resolve_alias_falls_back_to_literal_model_name() {
        let config = minimal_config();
        // "qwen2.5:1.5b" isn't in the registry — treated as a literal model name.
        assert_eq!(config.resolve_alias("qwen2.5:1.5b"), "qwen2.5:1.5b");
    }
}
