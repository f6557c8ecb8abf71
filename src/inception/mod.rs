//! Inception Stream Processor — resolves mid-stream expert sub-queries.
//!
//! A model's streamed answer can itself ask another model a question via an
//! inline `<sub-query model="ALIAS">...</sub-query>` tag (or a batch of them
//! in a `<parallel-query>` block). This module scans the stream for those
//! tags ([`scanner`]), dispatches each to the host carrying the named model,
//! splices the result back into the output, and bounds how deep that can
//! recurse ([`depth`]).
//!
//! The producer/consumer split is the same shape as the Fleet Manager's
//! parallel host probing, generalized from "probe every host" to "drain one
//! backend stream while resolving whatever tags appear in it".

mod depth;
mod scanner;
mod tags;

pub use depth::{DepthContext, DepthError};
pub use scanner::{ScanEvent, TagScanner};
pub use tags::{SubQuery, SubQueryResult};

use std::{sync::Arc, time::Instant};

use anyhow::Context as _;
use futures::future::{join_all, BoxFuture};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{BackendClient, GenerateOptions},
    config::Config,
    fleet::FleetManager,
};

/// System prompt given to an expert answering a sub-query — keeps it from
/// nesting further tags into its own response.
const SUB_QUERY_SYSTEM_PROMPT: &str =
    "Answer the question directly and concisely. Do not emit <sub-query> or \
     <parallel-query> tags in your response.";

fn sub_query_options() -> GenerateOptions {
    GenerateOptions { num_ctx: Some(4096), num_predict: Some(500), temperature: Some(0.3) }
}

/// Lifecycle hooks for one [`InceptionProcessor::process_stream`] call.
///
/// Split into named events here because a caller (the `ask`/`inception`
/// tools) cares about sub-query boundaries, not just raw text.
pub trait InceptionCallbacks: Send {
    fn on_start(&mut self) {}
    fn on_chunk(&mut self, text: &str);
    fn on_sub_query_start(&mut self, _sub: &SubQuery) {}
    fn on_sub_query_end(&mut self, _result: &SubQueryResult) {}
    fn on_end(&mut self) {}
}

/// Resolves sub-query tags found in a streamed model response.
pub struct InceptionProcessor {
    config: Arc<Config>,
    fleet: Arc<FleetManager>,
}

impl InceptionProcessor {
    pub fn new(config: Arc<Config>, fleet: Arc<FleetManager>) -> Self {
        Self { config, fleet }
    }

    /// Stream `query` through `model` on `client`, resolving any sub-query
    /// tags that appear in the output before handing text to `callbacks`.
    ///
    /// The backend call runs on a separate task from the tag-scanning
    /// consumer, connected by an mpsc channel — so a slow sub-query
    /// resolution doesn't stall the producer from reading further backend
    /// output into the channel buffer.
    pub async fn process_stream(
        &self,
        model: &str,
        client: Arc<BackendClient>,
        query: &str,
        cancel: &CancellationToken,
        callbacks: &mut dyn InceptionCallbacks,
    ) -> anyhow::Result<crate::backend::GenerateChunk> {
        callbacks.on_start();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let model_owned = model.to_string();
        let query_owned = query.to_string();
        let producer_cancel = cancel.clone();

        let producer = tokio::spawn(async move {
            client
                .generate_stream(&model_owned, &query_owned, None, None, &producer_cancel, |delta| {
                    let _ = tx.send(delta.to_string());
                })
                .await
        });

        let depth_ctx = DepthContext::new(self.config.inception.max_depth);
        let mut scanner = TagScanner::new(self.config.inception.partial_tag_buffer_max_bytes);

        while let Some(delta) = rx.recv().await {
            for event in scanner.feed(&delta) {
                self.emit(event, &depth_ctx, cancel, true, callbacks).await;
            }
        }
        for event in scanner.flush() {
            self.emit(event, &depth_ctx, cancel, true, callbacks).await;
        }

        callbacks.on_end();

        producer.await.context("inception producer task panicked")?
    }

    async fn emit(
        &self,
        event: ScanEvent,
        depth_ctx: &DepthContext,
        cancel: &CancellationToken,
        resolve_nested: bool,
        callbacks: &mut dyn InceptionCallbacks,
    ) {
        match event {
            ScanEvent::Text(text) => callbacks.on_chunk(&text),
            ScanEvent::SubQuery(sub) => {
                callbacks.on_sub_query_start(&sub);
                let result =
                    self.execute_sub_query(depth_ctx.clone(), sub, cancel.clone(), resolve_nested).await;
                callbacks.on_chunk(&splice_block(&result));
                callbacks.on_sub_query_end(&result);
            }
            ScanEvent::ParallelQuery(subs) => {
                for sub in &subs {
                    callbacks.on_sub_query_start(sub);
                }
                let results = join_all(subs.into_iter().map(|s| {
                    self.execute_sub_query(depth_ctx.clone(), s, cancel.clone(), resolve_nested)
                }))
                .await;
                callbacks.on_chunk(&splice_parallel_block(&results));
                for result in &results {
                    callbacks.on_sub_query_end(result);
                }
            }
        }
    }

    /// Dispatch a query directly to one aliased expert model, bypassing tier
    /// routing entirely — used by the `inception` tool when a caller already
    /// knows which expert it wants.
    ///
    /// Unlike sub-queries resolved mid-stream, this does not accept nested
    /// tags: the expert's own response is spliced back verbatim, not
    /// recursively scanned.
    pub async fn dispatch_direct(&self, model_alias: &str, query: &str) -> SubQueryResult {
        let depth_ctx = DepthContext::new(self.config.inception.max_depth);
        let sub = SubQuery {
            model_alias: model_alias.to_string(),
            query: query.to_string(),
            raw_match: String::new(),
        };
        self.execute_sub_query(depth_ctx, sub, CancellationToken::new(), false).await
    }

    /// Dispatch one sub-query to the host carrying its resolved model,
    /// streaming the expert's answer into a single accumulated response, then
    /// — if `resolve_nested` — recursively resolve any sub-query tags found
    /// in *that* response, bounded by `depth_ctx`.
    fn execute_sub_query<'a>(
        &'a self,
        depth_ctx: DepthContext,
        sub: SubQuery,
        cancel: CancellationToken,
        resolve_nested: bool,
    ) -> BoxFuture<'a, SubQueryResult> {
        Box::pin(async move {
            let started = Instant::now();

            let _guard = match depth_ctx.enter() {
                Ok(guard) => guard,
                Err(e) => {
                    return SubQueryResult {
                        query: sub,
                        response: None,
                        duration: started.elapsed(),
                        error: Some(e.to_string()),
                    }
                }
            };

            let model_name = self.config.resolve_alias(&sub.model_alias).to_string();

            let Some(host) = self.fleet.get_host_with_model(&model_name).await else {
                return SubQueryResult {
                    query: sub,
                    response: None,
                    duration: started.elapsed(),
                    error: Some(format!("no reachable host carries model `{model_name}`")),
                };
            };
            let Some(client) = self.fleet.registry().client(&host.name) else {
                return SubQueryResult {
                    query: sub,
                    response: None,
                    duration: started.elapsed(),
                    error: Some(format!("host `{}` vanished from the registry", host.name)),
                };
            };

            let timeout = std::time::Duration::from_secs(self.config.inception.timeout_secs);
            let mut acc = String::new();
            let outcome = tokio::time::timeout(
                timeout,
                client.generate_stream(
                    &model_name,
                    &sub.query,
                    Some(SUB_QUERY_SYSTEM_PROMPT),
                    Some(sub_query_options()),
                    &cancel,
                    |delta| acc.push_str(delta),
                ),
            )
            .await;

            match outcome {
                Ok(Ok(_)) => {
                    let resolved = if resolve_nested {
                        self.resolve_text(depth_ctx.clone(), cancel.clone(), acc).await
                    } else {
                        acc
                    };
                    SubQueryResult {
                        query: sub,
                        response: Some(resolved),
                        duration: started.elapsed(),
                        error: None,
                    }
                }
                Ok(Err(e)) => SubQueryResult {
                    query: sub,
                    response: None,
                    duration: started.elapsed(),
                    error: Some(e.to_string()),
                },
                Err(_) => SubQueryResult {
                    query: sub,
                    response: None,
                    duration: started.elapsed(),
                    error: Some(format!("sub-query timed out after {timeout:?}")),
                },
            }
        })
    }

    /// Scan a complete (non-streamed) piece of text for sub-query tags and
    /// splice in their resolutions. Used to resolve tags nested inside an
    /// expert's own answer.
    fn resolve_text<'a>(
        &'a self,
        depth_ctx: DepthContext,
        cancel: CancellationToken,
        text: String,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let mut scanner = TagScanner::new(self.config.inception.partial_tag_buffer_max_bytes);
            let mut events = scanner.feed(&text);
            events.extend(scanner.flush());

            let mut out = String::new();
            for event in events {
                match event {
                    ScanEvent::Text(t) => out.push_str(&t),
                    ScanEvent::SubQuery(sub) => {
                        let result =
                            self.execute_sub_query(depth_ctx.clone(), sub, cancel.clone(), true).await;
                        out.push_str(&splice_block(&result));
                    }
                    ScanEvent::ParallelQuery(subs) => {
                        let results = join_all(
                            subs.into_iter()
                                .map(|s| self.execute_sub_query(depth_ctx.clone(), s, cancel.clone(), true)),
                        )
                        .await;
                        out.push_str(&splice_parallel_block(&results));
                    }
                }
            }
            out
        })
    }
}

/// Render one resolved sub-query back into the output stream.
fn splice_block(result: &SubQueryResult) -> String {
    match &result.response {
        Some(response) => format!(
            "\n[sub-query → {}: {} ({:.1}s)]\n",
            result.query.model_alias,
            response.trim(),
            result.duration.as_secs_f64()
        ),
        None => format!("\n[Sub-query failed: {}]\n", result.error.as_deref().unwrap_or("unknown error")),
    }
}

fn splice_parallel_block(results: &[SubQueryResult]) -> String {
    let mut out = String::from("\n[parallel-query]\n");
    for result in results {
        out.push_str(&splice_block(result));
    }
    out.push_str("[/parallel-query]\n");
    out
}
