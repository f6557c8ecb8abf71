//! Typed HTTP client to a single Ollama-style backend host.
//!
//! One [`BackendClient`] talks to exactly one host. The Host Registry
//! (`crate::fleet::registry`) owns one client per configured [`crate::config::Host`],
//! caching them by host name.

mod client;

pub use client::{
    BackendClient, ChatMessage, ChatResponse, GenerateChunk, GenerateOptions, ModelInfo,
};
