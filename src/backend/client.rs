//! Ollama-style backend client.
//!
//! A buffered [`reqwest::Client`] with a configured timeout for
//! request/response calls, and a second, timeout-less client for streaming
//! calls whose lifetime is governed by a caller-supplied [`CancellationToken`]
//! instead. Ollama's native `/api/generate` and `/api/chat` endpoints stream
//! newline-delimited JSON objects, so this client owns a small line-splitter
//! that accumulates partial lines across TCP reads.

use std::time::{Duration, Instant};

use anyhow::Context as _;
use futures_util::StreamExt as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One model as reported by `GET /api/tags`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization: String,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digest: String,
    #[serde(default)]
    details: Option<TagModelDetails>,
}

#[derive(Debug, Deserialize, Default)]
struct TagModelDetails {
    #[serde(default)]
    family: String,
    #[serde(default)]
    parameter_size: String,
    #[serde(default)]
    quantization_level: String,
}

impl From<TagModel> for ModelInfo {
    fn from(m: TagModel) -> Self {
        let details = m.details.unwrap_or_default();
        Self {
            name: m.name,
            size_bytes: m.size,
            family: details.family,
            parameter_size: details.parameter_size,
            quantization: details.quantization_level,
            digest: m.digest,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Generation knobs forwarded as `options` in the wire request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One streamed (or the final, non-streamed) chunk of `/api/generate` output.
///
/// Only the `done=true` chunk carries the timing/token-count fields — earlier
/// chunks have them absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: ChatResponseMessage,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// A growable line buffer that accumulates partial lines across chunks of a
/// byte stream, yielding only complete `\n`-terminated lines.
///
/// Unbounded by design — must accommodate single lines `>= 1 MiB`; a fixed
/// cap would silently corrupt a legitimate large chunk.
struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    fn new() -> Self {
        Self { buf: Vec::with_capacity(4096) }
    }

    /// Feed new bytes in; return any complete lines found so far.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            // Drop the trailing newline before decoding.
            let line = &line[..line.len() - 1];
            if let Ok(s) = std::str::from_utf8(line) {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
        }
        lines
    }
}

/// Client for one Ollama-style backend host.
#[derive(Debug)]
pub struct BackendClient {
    /// Buffered requests — bound by the configured request timeout.
    client: Client,
    /// Streaming requests — no request-level timeout; cancellation is the
    /// caller's responsibility via a [`CancellationToken`].
    stream_client: Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client for a host at `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        let stream_client = Client::builder()
            .build()
            .expect("failed to build streaming reqwest client");

        Self { client, stream_client, base_url }
    }

    /// `GET /api/tags` — list models available on this host.
    pub async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        let text = response.text().await.context("reading tags response body")?;
        if !status.is_success() {
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }
        let parsed: TagsResponse =
            serde_json::from_str(&text).with_context(|| format!("parsing tags response: {text}"))?;
        Ok(parsed.models.into_iter().map(ModelInfo::from).collect())
    }

    /// `GET /api/version`.
    pub async fn version(&self) -> anyhow::Result<String> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        let text = response.text().await.context("reading version response body")?;
        if !status.is_success() {
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }
        let parsed: VersionResponse =
            serde_json::from_str(&text).with_context(|| format!("parsing version response: {text}"))?;
        Ok(parsed.version)
    }

    /// Timed `GET /api/tags` — used as the liveness probe.
    pub async fn ping(&self) -> anyhow::Result<Duration> {
        let t0 = Instant::now();
        self.list_models().await?;
        Ok(t0.elapsed())
    }

    /// Non-streaming `POST /api/generate`.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        opts: Option<GenerateOptions>,
    ) -> anyhow::Result<GenerateChunk> {
        let url = format!("{}/api/generate", self.base_url);
        let body = build_generate_body(model, prompt, system, opts, false);
        let response =
            self.client.post(&url).json(&body).send().await.with_context(|| format!("POST {url}"))?;
        let status = response.status();
        let text = response.text().await.context("reading generate response body")?;
        if !status.is_success() {
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }
        serde_json::from_str(&text).with_context(|| format!("parsing generate response: {text}"))
    }

    /// Streaming `POST /api/generate`.
    ///
    /// `on_chunk` is invoked once per non-empty decoded token batch. Returns
    /// the final `done=true` chunk's stats. An absence of a final `done=true`
    /// chunk (e.g. the connection simply closes) is an error; malformed lines
    /// are skipped silently.
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        opts: Option<GenerateOptions>,
        cancel: &CancellationToken,
        mut on_chunk: impl FnMut(&str),
    ) -> anyhow::Result<GenerateChunk> {
        let url = format!("{}/api/generate", self.base_url);
        let body = build_generate_body(model, prompt, system, opts, true);

        let response = tokio::select! {
            r = self.stream_client.post(&url).json(&body).send() => {
                r.with_context(|| format!("POST {url} (streaming)"))?
            }
            _ = cancel.cancelled() => anyhow::bail!("generate_stream cancelled before response headers"),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }

        let mut byte_stream = response.bytes_stream();
        let mut splitter = LineSplitter::new();
        let mut final_chunk: Option<GenerateChunk> = None;

        loop {
            let next = tokio::select! {
                n = byte_stream.next() => n,
                _ = cancel.cancelled() => anyhow::bail!("generate_stream cancelled mid-stream"),
            };
            let Some(bytes) = next else { break };
            let bytes = bytes.context("reading generate stream body")?;

            for line in splitter.feed(&bytes) {
                let Ok(chunk) = serde_json::from_str::<GenerateChunk>(&line) else { continue };
                if !chunk.response.is_empty() {
                    on_chunk(&chunk.response);
                }
                if chunk.done {
                    final_chunk = Some(chunk);
                }
            }
        }

        final_chunk.context("stream closed without a final done=true chunk")
    }

    /// Non-streaming `POST /api/chat`.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&Value>,
    ) -> anyhow::Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if let Some(tools) = tools {
            body["tools"] = tools.clone();
        }
        let response =
            self.client.post(&url).json(&body).send().await.with_context(|| format!("POST {url}"))?;
        let status = response.status();
        let text = response.text().await.context("reading chat response body")?;
        if !status.is_success() {
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }
        serde_json::from_str(&text).with_context(|| format!("parsing chat response: {text}"))
    }

    /// `POST /api/pull` with streamed progress callbacks. Used operationally;
    /// not exercised by the Router or Inception Processor.
    pub async fn pull(&self, model: &str, mut on_progress: impl FnMut(&str)) -> anyhow::Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let body = serde_json::json!({ "name": model, "stream": true });
        let response = self
            .stream_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("backend returned HTTP {status} for {url}: {text}");
        }

        let mut byte_stream = response.bytes_stream();
        let mut splitter = LineSplitter::new();
        while let Some(bytes) = byte_stream.next().await {
            let bytes = bytes.context("reading pull stream body")?;
            for line in splitter.feed(&bytes) {
                on_progress(&line);
            }
        }
        Ok(())
    }
}

fn build_generate_body(
    model: &str,
    prompt: &str,
    system: Option<&str>,
    opts: Option<GenerateOptions>,
    stream: bool,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "prompt": prompt,
        "stream": stream,
    });
    if let Some(system) = system {
        body["system"] = Value::String(system.to_string());
    }
    if let Some(opts) = opts {
        body["options"] = serde_json::to_value(opts).unwrap_or(Value::Null);
    }
    body
}
