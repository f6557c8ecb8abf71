//! Keyword-phrase lists used by the Tier Classifier.
//!
//! Lists are matched as case-insensitive substrings anywhere in the query.
//! Pinned here rather than left to a "roughly these words" phrasing — see
//! DESIGN.md. Lists must not overlap by substring: "documentation" contains
//! "document", so listing both would double-count a single occurrence.

pub const FAST: &[&str] = &["what is", "syntax", "quick", "simple"];

pub const DEEP: &[&str] =
    &["refactor", "implement", "codebase", "architecture", "debug", "multi-step"];

pub const ANALYSIS: &[&str] =
    &["review", "trade-off", "tradeoff", "compare", "evaluate", "analyze", "analyse"];

pub const WRITING: &[&str] =
    &["document", "write a", "tutorial", "commit message", "readme"];
