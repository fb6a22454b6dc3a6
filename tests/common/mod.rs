//! Common test utilities.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::connect_info::MockConnectInfo;
use axum::Router;

use graphrelay::graph::{
    AgentGraph, AgentMessage, AgentState, GraphError, GraphEvent, GraphStream, LazyGraph,
    ThreadConfig, ToolInvocation,
};
use graphrelay::handlers::rate_limit::build_limiter;
use graphrelay::server::{build_app, AppState};

// ============================================================================
// Scripted Graph
// ============================================================================

/// What the scripted graph does when invoked.
pub enum InvokeScript {
    /// Append an assistant reply (optionally carrying tool invocations) to
    /// the request state.
    Reply {
        content: String,
        tool_calls: Vec<ToolInvocation>,
    },
    /// Append a fixed sequence of messages to the request state, e.g. a
    /// tool turn followed by the final assistant reply.
    Transcript(Vec<AgentMessage>),
    /// Return a state with no messages at all.
    Empty,
    /// Fail the invocation.
    Fail(String),
}

/// A graph that follows a fixed script instead of calling a provider.
pub struct ScriptedGraph {
    invoke: InvokeScript,
    /// Events yielded by the streaming operation, in order. `Err` entries
    /// become upstream failures.
    events: Vec<Result<GraphEvent, String>>,
    /// When set, the streaming operation fails before yielding anything.
    stream_setup_error: Option<String>,
}

impl ScriptedGraph {
    pub fn replying(content: &str) -> Self {
        Self {
            invoke: InvokeScript::Reply {
                content: content.to_string(),
                tool_calls: Vec::new(),
            },
            events: vec![
                Ok(GraphEvent::Token(content.to_string())),
                Ok(GraphEvent::Done),
            ],
            stream_setup_error: None,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolInvocation>) -> Self {
        if let InvokeScript::Reply {
            tool_calls: ref mut calls,
            ..
        } = self.invoke
        {
            *calls = tool_calls;
        }
        self
    }

    pub fn with_events(mut self, events: Vec<Result<GraphEvent, String>>) -> Self {
        self.events = events;
        self
    }

    pub fn with_transcript(messages: Vec<AgentMessage>) -> Self {
        Self {
            invoke: InvokeScript::Transcript(messages),
            events: vec![Ok(GraphEvent::Done)],
            stream_setup_error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            invoke: InvokeScript::Empty,
            events: vec![Ok(GraphEvent::Done)],
            stream_setup_error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            invoke: InvokeScript::Fail(message.to_string()),
            events: Vec::new(),
            stream_setup_error: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl AgentGraph for ScriptedGraph {
    async fn invoke(
        &self,
        state: AgentState,
        _config: ThreadConfig,
    ) -> Result<AgentState, GraphError> {
        match &self.invoke {
            InvokeScript::Reply {
                content,
                tool_calls,
            } => {
                let mut messages = state.messages;
                messages.push(AgentMessage {
                    role: graphrelay::graph::MessageRole::Assistant,
                    content: content.clone(),
                    tool_calls: tool_calls.clone(),
                });
                Ok(AgentState {
                    messages,
                    session_id: state.session_id,
                })
            }
            InvokeScript::Transcript(extra) => {
                let mut messages = state.messages;
                messages.extend(extra.iter().cloned());
                Ok(AgentState {
                    messages,
                    session_id: state.session_id,
                })
            }
            InvokeScript::Empty => Ok(AgentState {
                messages: Vec::new(),
                session_id: state.session_id,
            }),
            InvokeScript::Fail(message) => Err(GraphError::Decode(message.clone())),
        }
    }

    async fn stream(
        &self,
        _state: AgentState,
        _config: ThreadConfig,
    ) -> Result<GraphStream, GraphError> {
        if let Some(message) = &self.stream_setup_error {
            return Err(GraphError::Decode(message.clone()));
        }
        let events: Vec<Result<GraphEvent, GraphError>> = self
            .events
            .iter()
            .map(|entry| match entry {
                Ok(event) => Ok(event.clone()),
                Err(message) => Err(GraphError::Decode(message.clone())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

// ============================================================================
// App Builders
// ============================================================================

/// Create a test app around a scripted graph. No API key, generous quota,
/// requests appear to come from loopback.
pub fn test_app(graph: ScriptedGraph) -> Router {
    test_app_with(graph, None, 1000)
}

pub fn test_app_with(
    graph: ScriptedGraph,
    api_key: Option<String>,
    requests_per_minute: u32,
) -> Router {
    let state = AppState {
        graph: LazyGraph::preset(Arc::new(graph)),
        rate_limiter: build_limiter(requests_per_minute),
        api_key,
        keep_alive_interval_seconds: 15,
    };
    build_app(state, 300).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 41234))))
}

/// Same as [`test_app_with`] but with a non-loopback peer address, for
/// exercising the localhost-only fallback.
pub fn test_app_remote(graph: ScriptedGraph, api_key: Option<String>) -> Router {
    let state = AppState {
        graph: LazyGraph::preset(Arc::new(graph)),
        rate_limiter: build_limiter(1000),
        api_key,
        keep_alive_interval_seconds: 15,
    };
    build_app(state, 300).layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 9], 443))))
}
