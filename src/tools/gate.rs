//! `should_search_web` heuristic.
//!
//! Grounded on the same pure-rule-table style as [`crate::classify::classify`]
//! but fleet-aware: whether a query is "LLM-suitable" depends on whether a
//! local model is actually reachable right now, so this can't be a pure
//! function the way the tier classifier is.

use serde::Serialize;

use crate::fleet::FleetManager;

/// `(phrase, tool)` pairs — first match wins and names the local tool that
/// answers the query without ever leaving the machine.
const CODEBASE_RULES: &[(&str, &str)] = &[
    ("where is", "grep"),
    ("find file", "tree"),
    ("project structure", "tree"),
    ("how does", "grep"),
    ("this codebase", "grep"),
    ("this repo", "grep"),
    ("this file", "grep"),
    ("our codebase", "grep"),
    ("in this project", "grep"),
    ("the function above", "symbols"),
    ("this function", "symbols"),
    ("import", "imports"),
    ("function", "symbols"),
];

/// Phrases a local model can reasonably answer from its own training —
/// opinion, best-practice, or design-tradeoff questions with no dependency on
/// anything that changes after the model's cutoff.
const LLM_SUITABLE_PATTERNS: &[&str] =
    &["best practice", "recommend", "pros and cons", "should i use", "explain"];

/// Phrases implying the answer depends on something that changes after the
/// model's training cutoff — current events, released software, live data.
const EXTERNAL_SIGNAL_PHRASES: &[&str] = &[
    "latest version",
    "latest release",
    "release notes",
    "changelog",
    "current version",
    "today",
    "this week",
    "recent news",
    "just released",
    "cve-",
    "breaking change in",
    "stock price",
    "weather",
    "github.com",
    "stackoverflow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    UseLocalTool,
    UseLocalLlm,
    WebSearchApproved,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GateDecision {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub original_query: String,
}

/// Decide how `query` should be answered: a local tool, the local model
/// fleet, or a web search.
///
/// Codebase-locality rules are checked first and win outright. If none
/// match, an LLM-suitable pattern paired with at least one online backend
/// host authorizes `UseLocalLlm`. Otherwise an external-signal phrase — or,
/// failing that, the absence of any signal at all — authorizes
/// `WebSearchApproved`: the query either clearly needs fresh information, or
/// there's nothing locally that can confidently answer it.
pub async fn should_search_web(fleet: &FleetManager, query: &str) -> GateDecision {
    let lower = query.to_lowercase();

    if let Some((phrase, tool)) = CODEBASE_RULES.iter().find(|(phrase, _)| lower.contains(phrase)) {
        return GateDecision {
            verdict: Verdict::UseLocalTool,
            tool: Some(tool.to_string()),
            reason: format!("query matches local-codebase pattern `{phrase}`"),
            instruction: Some(format!("run the `{tool}` tool against this repository")),
            original_query: query.to_string(),
        };
    }

    if LLM_SUITABLE_PATTERNS.iter().any(|phrase| lower.contains(phrase)) {
        let any_online = fleet.get_best_host().await.is_some();
        if any_online {
            return GateDecision {
                verdict: Verdict::UseLocalLlm,
                tool: None,
                reason: "query is answerable from model knowledge and a backend host is online"
                    .to_string(),
                instruction: Some("route this query through `ask` rather than searching".to_string()),
                original_query: query.to_string(),
            };
        }
    }

    if let Some(phrase) = EXTERNAL_SIGNAL_PHRASES.iter().find(|phrase| lower.contains(**phrase)) {
        return GateDecision {
            verdict: Verdict::WebSearchApproved,
            tool: None,
            reason: format!("query matches external-signal pattern `{phrase}`"),
            instruction: None,
            original_query: query.to_string(),
        };
    }

    GateDecision {
        verdict: Verdict::WebSearchApproved,
        tool: None,
        reason: "no local tool or online backend can confidently answer this".to_string(),
        instruction: None,
        original_query: query.to_string(),
    }
}
