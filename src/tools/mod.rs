//! Tool Server — dispatches the eight named tools exposed to external
//! agents: `preflight`, `should_search_web`, `hosts`, `models`, `system`,
//! `health`, `ask`, `inception`.
//!
//! One handler per named tool rather than one per REST resource, since every
//! tool here is invoked the same way (`POST /tools/{name}` or the batched
//! `POST /tools/invoke`).

pub mod gate;
pub mod preflight;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{backend::ModelInfo, error::ToolError, inception::InceptionCallbacks, state::AppState};

/// Body of `POST /tools/invoke` — a JSON-RPC-like envelope naming the tool
/// and its arguments.
#[derive(Debug, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Deserialize, Default)]
struct QueryArgs {
    query: String,
}

#[derive(Debug, Deserialize, Default)]
struct ModelsArgs {
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AskArgs {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    dialogue: bool,
}

#[derive(Debug, Deserialize)]
struct InceptionArgs {
    expert: String,
    query: String,
}

#[derive(Debug, Serialize)]
struct InceptionResult {
    model_alias: String,
    response: Option<String>,
    duration_ms: u128,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    os: String,
    arch: String,
    cpu_count: usize,
    gpu: Option<String>,
    vram_bytes: Option<u64>,
}

/// Wire shape for the `hosts` tool — a host's reachable state plus its URL,
/// never its raw probe [`Duration`].
#[derive(Debug, Serialize)]
struct HostSummary {
    name: String,
    url: String,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    models: Option<Vec<ModelInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct AccumulatingCallbacks {
    buf: String,
}

impl InceptionCallbacks for AccumulatingCallbacks {
    fn on_chunk(&mut self, text: &str) {
        self.buf.push_str(text);
    }
}

/// Dispatch one named tool call. Tool-level failures (no host reachable, a
/// sub-query timing out) are returned as part of the `Ok` value — these are
/// in-band results, not transport errors. [`ToolError`] is reserved for a
/// request that can't even be understood: an unknown tool name or args that
/// don't match the tool's expected shape.
pub async fn dispatch(state: &AppState, tool: &str, args: Value) -> Result<Value, ToolError> {
    match tool {
        "preflight" => {
            let result = preflight::preflight(&state.config, &state.fleet).await;
            Ok(serde_json::to_value(result)?)
        }
        "should_search_web" => {
            let args: QueryArgs = serde_json::from_value(args)?;
            let result = gate::should_search_web(&state.fleet, &args.query).await;
            Ok(serde_json::to_value(result)?)
        }
        "hosts" => {
            let statuses = state.fleet.check_all_hosts().await;
            let summaries: Vec<HostSummary> = statuses
                .into_iter()
                .map(|s| {
                    let url = state
                        .fleet
                        .registry()
                        .host(&s.name)
                        .map(|h| h.url.clone())
                        .unwrap_or_default();
                    HostSummary {
                        name: s.name,
                        url,
                        online: s.online,
                        latency_ms: s.online.then(|| s.latency.as_millis() as u64),
                        version: (!s.version.is_empty()).then_some(s.version),
                        models: (!s.models.is_empty()).then_some(s.models),
                        error: s.error,
                    }
                })
                .collect();
            Ok(serde_json::to_value(summaries)?)
        }
        "models" => {
            let args: ModelsArgs = serde_json::from_value(args).unwrap_or_default();
            state.fleet.check_all_hosts().await;
            match args.host {
                Some(host) => match state.fleet.cached(&host).await {
                    Some(status) if status.online => Ok(serde_json::to_value(status.models)?),
                    Some(_) => Ok(serde_json::json!({ "error": format!("host `{host}` is offline") })),
                    None => Ok(serde_json::json!({ "error": format!("unknown host `{host}`") })),
                },
                None => {
                    let models = state.fleet.get_all_models().await;
                    Ok(serde_json::to_value(models)?)
                }
            }
        }
        "system" => Ok(serde_json::to_value(system_info())?),
        "health" => {
            let statuses = state.fleet.check_all_hosts().await;
            let hosts_online = statuses.iter().filter(|s| s.online).count();
            let tiers = &state.config.tiers;
            Ok(serde_json::json!({
                "hosts_online": hosts_online,
                "hosts_total": statuses.len(),
                "tiers": {
                    "fast": tiers.fast.primary_model,
                    "deep": tiers.deep.primary_model,
                    "analysis": tiers.analysis.primary_model,
                    "writing": tiers.writing.primary_model,
                },
            }))
        }
        "ask" => {
            let args: AskArgs = serde_json::from_value(args)?;
            Ok(ask(state, args).await)
        }
        "inception" => {
            let args: InceptionArgs = serde_json::from_value(args)?;
            let started = Instant::now();
            let result = state.inception.dispatch_direct(&args.expert, &args.query).await;
            Ok(serde_json::to_value(InceptionResult {
                model_alias: args.expert,
                response: result.response,
                duration_ms: started.elapsed().as_millis(),
                error: result.error,
            })?)
        }
        other => Err(anyhow::anyhow!("unknown tool `{other}`").into()),
    }
}

async fn ask(state: &AppState, args: AskArgs) -> Value {
    let _ = args.dialogue;
    let decision = state.router.route(&args.prompt, None, args.model.as_deref(), args.host.as_deref()).await;

    let (Some(host), Some(client)) = (decision.host, decision.client) else {
        return serde_json::json!({ "error": "no host reachable for this request" });
    };

    let mut callbacks = AccumulatingCallbacks { buf: String::new() };
    let cancel = tokio_util::sync::CancellationToken::new();
    let outcome = state
        .inception
        .process_stream(&decision.model, client, &args.prompt, &cancel, &mut callbacks)
        .await;

    match outcome {
        Ok(_) => Value::String(format!("[{}@{}]\n{}", decision.model, host.name, callbacks.buf)),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    }
}

fn system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        // No GPU/VRAM introspection crate appears anywhere in the corpus —
        // reported as absent rather than guessed at.
        gpu: None,
        vram_bytes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, Host, InceptionConfig, RoutingConfig, ServerConfig, TierEntry, TierTable,
    };
    use crate::fleet::{FleetManager, HostRegistry};
    use std::{collections::HashMap, sync::Arc, time::Duration};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Arc<Config> {
        Arc::new(Config {
            server: ServerConfig { port: 8090 },
            hosts: Vec::new(),
            tiers: TierTable {
                fast: TierEntry { primary_model: "fast-model".into(), fallback_model: None },
                deep: TierEntry { primary_model: "deep-model".into(), fallback_model: None },
                analysis: TierEntry { primary_model: "analysis-model".into(), fallback_model: None },
                writing: TierEntry { primary_model: "writing-model".into(), fallback_model: None },
            },
            registry: HashMap::new(),
            routing: RoutingConfig { fallback: true },
            inception: InceptionConfig::default(),
        })
    }

    #[tokio::test]
    async fn unknown_tool_name_is_rejected() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        assert!(dispatch(&state, "not-a-real-tool", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn health_tool_reports_hosts_and_tiers() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result = dispatch(&state, "health", Value::Null).await.unwrap();
        assert_eq!(result["hosts_online"], 0);
        assert_eq!(result["tiers"]["fast"], "fast-model");
    }

    #[tokio::test]
    async fn preflight_tool_lists_the_tool_catalog() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result = dispatch(&state, "preflight", Value::Null).await.unwrap();
        assert!(result["tools"].as_array().unwrap().contains(&Value::String("ask".into())));
        assert_eq!(result["fleet_online"], false);
    }

    #[tokio::test]
    async fn system_tool_reports_a_plausible_cpu_count() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result = dispatch(&state, "system", Value::Null).await.unwrap();
        assert!(result["cpu_count"].as_u64().unwrap() >= 1);
        assert!(result["gpu"].is_null());
    }

    #[tokio::test]
    async fn ask_tool_reports_in_band_error_when_no_host_reachable() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result =
            dispatch(&state, "ask", serde_json::json!({ "prompt": "what is a mutex?" }))
                .await
                .unwrap();
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn ask_tool_returns_a_model_at_host_banner_prefixed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "fast-model" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "version": "0.1" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"response\":\"a mutex is a lock\",\"done\":true}\n"),
            )
            .mount(&server)
            .await;

        let host = Host { name: "h1".into(), url: server.uri(), priority: 0, enabled: true };
        let registry = Arc::new(HostRegistry::new(vec![host], Duration::from_secs(5)));
        let fleet = Arc::new(FleetManager::new(registry));
        fleet.check_all_hosts().await;
        let state = AppState::new(config(), fleet);

        let result =
            dispatch(&state, "ask", serde_json::json!({ "prompt": "what is a mutex?" }))
                .await
                .unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("[fast-model@h1]\n"));
        assert!(text.contains("a mutex is a lock"));
    }

    #[tokio::test]
    async fn models_tool_with_host_arg_returns_that_hosts_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "fast-model" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "version": "0.1" })))
            .mount(&server)
            .await;

        let host = Host { name: "h1".into(), url: server.uri(), priority: 0, enabled: true };
        let registry = Arc::new(HostRegistry::new(vec![host], Duration::from_secs(5)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result = dispatch(&state, "models", serde_json::json!({ "host": "h1" })).await.unwrap();
        assert_eq!(result[0]["name"], "fast-model");
    }

    #[tokio::test]
    async fn models_tool_with_unknown_host_reports_an_error() {
        let registry = Arc::new(HostRegistry::new(Vec::new(), Duration::from_secs(1)));
        let fleet = Arc::new(FleetManager::new(registry));
        let state = AppState::new(config(), fleet);

        let result = dispatch(&state, "models", serde_json::json!({ "host": "ghost" })).await.unwrap();
        assert!(result.get("error").is_some());
    }
}
