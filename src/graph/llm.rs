//! LLM-backed agent graph.
//!
//! A single-node graph that forwards the conversation to an
//! OpenAI-compatible chat-completions endpoint (works with OpenAI,
//! OpenRouter, Ollama). Tool calls returned by the model are carried
//! through as [`ToolInvocation`] records; executing them is the concern of
//! a richer graph, not this one.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::sse::UpstreamEventStream;
use super::{
    AgentGraph, AgentMessage, AgentState, GraphError, GraphEvent, GraphStream, MessageRole,
    ThreadConfig, ToolInvocation,
};
use crate::checkpoint::Checkpointer;

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the upstream provider.
#[derive(Debug, Clone)]
pub struct LlmGraphConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

// ============================================================================
// LlmGraph
// ============================================================================

pub struct LlmGraph {
    client: Client,
    config: LlmGraphConfig,
    checkpointer: Checkpointer,
}

impl LlmGraph {
    #[must_use]
    pub fn new(config: LlmGraphConfig, checkpointer: Checkpointer) -> Self {
        Self {
            client: Client::new(),
            config,
            checkpointer,
        }
    }

    /// Prepend any checkpointed history for this thread to the request
    /// state. With the no-op checkpointer this returns the state unchanged.
    async fn with_history(&self, state: AgentState, thread_id: &str) -> AgentState {
        match self.checkpointer.load(thread_id).await {
            Ok(Some(mut prior)) => {
                prior.messages.extend(state.messages);
                prior.session_id = state.session_id;
                prior
            }
            Ok(None) => state,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "checkpoint load failed, continuing without history");
                state
            }
        }
    }

    fn request_builder(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(ref key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        req
    }
}

#[async_trait]
impl AgentGraph for LlmGraph {
    async fn invoke(
        &self,
        state: AgentState,
        config: ThreadConfig,
    ) -> Result<AgentState, GraphError> {
        let state = self.with_history(state, &config.thread_id).await;
        let request = CompletionRequest::from_state(&self.config, &state, false);

        let response = self.request_builder(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GraphError::Upstream { status, message });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Decode(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::Decode("response contained no choices".to_string()))?;

        let mut reply = AgentMessage::assistant(choice.message.content.unwrap_or_default());
        reply.tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_invocation)
            .collect();

        let mut final_state = state;
        final_state.messages.push(reply);

        if let Err(e) = self
            .checkpointer
            .save(&config.thread_id, &final_state)
            .await
        {
            tracing::warn!(thread_id = %config.thread_id, error = %e, "checkpoint save failed");
        }

        Ok(final_state)
    }

    async fn stream(
        &self,
        state: AgentState,
        config: ThreadConfig,
    ) -> Result<GraphStream, GraphError> {
        let state = self.with_history(state, &config.thread_id).await;
        let request = CompletionRequest::from_state(&self.config, &state, true);

        let response = self.request_builder(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GraphError::Upstream { status, message });
        }

        let events = UpstreamEventStream::new(response.bytes_stream());
        Ok(Box::pin(ChunkAdapter::new(events)))
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl CompletionRequest {
    fn from_state(config: &LlmGraphConfig, state: &AgentState, stream: bool) -> Self {
        Self {
            model: config.model.clone(),
            messages: state.messages.iter().map(WireMessage::from).collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream,
        }
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&AgentMessage> for WireMessage {
    fn from(msg: &AgentMessage) -> Self {
        let role = match msg.role {
            MessageRole::Human => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        };
        Self {
            role,
            content: msg.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl WireToolCall {
    /// The provider sends arguments as a JSON-encoded string; decode it,
    /// falling back to the raw string when it is not valid JSON.
    fn into_invocation(self) -> ToolInvocation {
        let args = serde_json::from_str(&self.function.arguments)
            .unwrap_or(serde_json::Value::String(self.function.arguments));
        ToolInvocation {
            name: self.function.name,
            args,
        }
    }
}

// ============================================================================
// Streaming Adapter
// ============================================================================

/// Converts decoded SSE chunks into [`GraphEvent`]s.
///
/// Tool calls arrive in pieces (id and name first, then argument fragments);
/// they are accumulated per index and emitted once complete.
struct ChunkAdapter<S> {
    inner: UpstreamEventStream<S>,
    pending_tool_calls: Vec<ToolCallAccumulator>,
    /// Completed tool calls waiting to be yielded one at a time.
    ready: Vec<ToolInvocation>,
    done_pending: bool,
    finished: bool,
}

#[derive(Default)]
struct ToolCallAccumulator {
    name: String,
    arguments: String,
}

impl<S> ChunkAdapter<S> {
    fn new(inner: UpstreamEventStream<S>) -> Self {
        Self {
            inner,
            pending_tool_calls: Vec::new(),
            ready: Vec::new(),
            done_pending: false,
            finished: false,
        }
    }

    fn finalize_tool_calls(&mut self) {
        for acc in std::mem::take(&mut self.pending_tool_calls) {
            if acc.name.is_empty() {
                continue;
            }
            let args = serde_json::from_str(&acc.arguments)
                .unwrap_or(serde_json::Value::String(acc.arguments));
            self.ready.push(ToolInvocation {
                name: acc.name,
                args,
            });
        }
    }

    fn absorb_chunk(&mut self, chunk: StreamChunk) -> Option<GraphEvent> {
        let choice = chunk.choices.into_iter().next()?;

        if let Some(tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                while self.pending_tool_calls.len() <= tc.index {
                    self.pending_tool_calls.push(ToolCallAccumulator::default());
                }
                let acc = &mut self.pending_tool_calls[tc.index];
                if let Some(func) = tc.function {
                    if let Some(name) = func.name {
                        acc.name = name;
                    }
                    if let Some(args) = func.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }
        }

        if choice.finish_reason.as_deref() == Some("tool_calls") {
            self.finalize_tool_calls();
        }

        match choice.delta.content {
            Some(content) if !content.is_empty() => Some(GraphEvent::Token(content)),
            _ => None,
        }
    }
}

impl<S> Stream for ChunkAdapter<S>
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<GraphEvent, GraphError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            // Drain completed tool calls before pulling more chunks.
            if !self.ready.is_empty() {
                let invocation = self.ready.remove(0);
                return Poll::Ready(Some(Ok(GraphEvent::ToolCall(invocation))));
            }
            if self.done_pending {
                self.finished = true;
                return Poll::Ready(Some(Ok(GraphEvent::Done)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if event.data.is_empty() {
                        continue;
                    }
                    if event.data == "[DONE]" {
                        self.finalize_tool_calls();
                        self.done_pending = true;
                        continue;
                    }
                    match serde_json::from_str::<StreamChunk>(&event.data) {
                        Ok(chunk) => {
                            if let Some(graph_event) = self.absorb_chunk(chunk) {
                                return Poll::Ready(Some(Ok(graph_event)));
                            }
                        }
                        Err(e) => {
                            tracing::debug!(data = %event.data, error = %e, "skipping undecodable stream chunk");
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(GraphError::Request(e))));
                }
                Poll::Ready(None) => {
                    self.finalize_tool_calls();
                    self.done_pending = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    index: usize,
    function: Option<StreamFunction>,
}

#[derive(Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
