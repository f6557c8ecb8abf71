//! `preflight` tool — a cheap, no-argument inventory call an agent runs once
//! before deciding how to use the rest of the tool catalog.

use serde::Serialize;

use crate::{config::Config, fleet::FleetManager};

const TOOL_NAMES: [&str; 8] =
    ["preflight", "should_search_web", "hosts", "models", "system", "health", "ask", "inception"];

#[derive(Debug, Clone, Serialize)]
pub struct PreflightResult {
    pub tools: Vec<&'static str>,
    pub fleet_online: bool,
    pub hosts_online: usize,
    pub hosts_total: usize,
    pub recommended_workflow: String,
}

/// Report the local-discovery inventory: which tools exist, whether the
/// backend fleet has any online host, and a recommended workflow given that.
pub async fn preflight(_config: &Config, fleet: &FleetManager) -> PreflightResult {
    let statuses = fleet.check_all_hosts().await;
    let hosts_online = statuses.iter().filter(|s| s.online).count();
    let hosts_total = statuses.len();
    let fleet_online = hosts_online > 0;

    let recommended_workflow = if fleet_online {
        "call `should_search_web` to classify the query, then `ask` to route it to the fleet"
            .to_string()
    } else {
        "no backend host is online; expect `ask`/`inception` to report an unreachable host, \
         and prefer `should_search_web`'s WEB_SEARCH_APPROVED/USE_LOCAL_TOOL verdicts"
            .to_string()
    };

    PreflightResult {
        tools: TOOL_NAMES.to_vec(),
        fleet_online,
        hosts_online,
        hosts_total,
        recommended_workflow,
    }
}
