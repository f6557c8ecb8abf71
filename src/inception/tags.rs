//! Sub-query/parallel-query value types.

use std::time::Duration;

/// A single `<sub-query model="ALIAS">...</sub-query>` (or one `<ask>` entry
/// inside a `<parallel-query>` block) extracted from a model's output.
#[derive(Debug, Clone, Eq)]
pub struct SubQuery {
    pub model_alias: String,
    pub query: String,
    /// The exact matched source text, kept for diagnostics only — excluded
    /// from equality so tests can compare on intent without reproducing it.
    pub raw_match: String,
}

impl PartialEq for SubQuery {
    fn eq(&self, other: &Self) -> bool {
        self.model_alias == other.model_alias && self.query == other.query
    }
}

/// The resolved outcome of dispatching one [`SubQuery`] to an expert model.
#[derive(Debug, Clone)]
pub struct SubQueryResult {
    pub query: SubQuery,
    pub response: Option<String>,
    pub duration: Duration,
    pub error: Option<String>,
}

impl SubQueryResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
