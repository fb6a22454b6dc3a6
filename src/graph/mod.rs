//! Agent graph invocation contract.
//!
//! The agent graph is the external execution engine behind the relay: it
//! takes a conversation state plus a thread configuration and produces
//! either a final state (batch) or a sequence of incremental events
//! (streaming). The relay never looks inside the graph; everything it needs
//! is expressed by [`AgentGraph`].

mod llm;
mod sse;

pub use llm::{LlmGraph, LlmGraphConfig};

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;

// ============================================================================
// State Types
// ============================================================================

/// The role of a message within the conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Assistant,
    System,
    Tool,
}

/// A tool invocation recorded by the graph (name plus argument mapping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub args: serde_json::Value,
}

/// One message in the conversation state.
///
/// `tool_calls` is always present and possibly empty, so callers never have
/// to probe for an optional attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentMessage {
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Conversation state passed into and returned by the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub messages: Vec<AgentMessage>,
    pub session_id: String,
}

impl AgentState {
    /// Initial state for one request: a single human message plus the
    /// resolved session id.
    #[must_use]
    pub fn initial(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            messages: vec![AgentMessage::human(message)],
            session_id: session_id.into(),
        }
    }
}

/// Thread configuration correlating persisted graph state with one
/// conversation. Carries the session id under a fixed key and is passed
/// unchanged to the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub thread_id: String,
}

impl ThreadConfig {
    #[must_use]
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

// ============================================================================
// Streaming Events
// ============================================================================

/// Incremental events produced by the graph's streaming operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A content token from the assistant.
    Token(String),
    /// A tool invocation recorded during execution.
    ToolCall(ToolInvocation),
    /// The graph finished executing.
    Done,
}

/// A boxed stream of graph events. Lazy, finite, non-restartable.
pub type GraphStream = Pin<Box<dyn Stream<Item = Result<GraphEvent, GraphError>> + Send>>;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised at the graph invocation boundary.
#[derive(Debug, Error)]
pub enum GraphError {
    /// HTTP request to the upstream provider failed.
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream provider returned an error response.
    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// The upstream response could not be decoded.
    #[error("malformed upstream response: {0}")]
    Decode(String),

    /// The graph could not be constructed.
    #[error("graph initialization failed: {0}")]
    Init(String),
}

// ============================================================================
// AgentGraph Trait
// ============================================================================

/// The public invocation contract of the agent graph.
///
/// Both operations take ownership of the state and config; each request owns
/// an independent execution. Requests sharing a session id are not
/// synchronized against each other.
#[async_trait]
pub trait AgentGraph: Send + Sync {
    /// Run the graph to completion and return the final state.
    ///
    /// May suspend for the duration of the entire external execution,
    /// including any tool calls the graph makes internally.
    async fn invoke(&self, state: AgentState, config: ThreadConfig)
        -> Result<AgentState, GraphError>;

    /// Run the graph in streaming mode, yielding events as they are
    /// produced. The stream may suspend between events for arbitrary
    /// durations; dropping it stops production.
    async fn stream(&self, state: AgentState, config: ThreadConfig)
        -> Result<GraphStream, GraphError>;
}

// ============================================================================
// Lazy Initialization
// ============================================================================

/// Factory producing the process-wide graph instance.
pub type GraphFactory =
    Arc<dyn Fn() -> Result<Arc<dyn AgentGraph>, GraphError> + Send + Sync>;

/// A graph instance constructed once per process, on first use.
///
/// Backed by [`tokio::sync::OnceCell`] so exactly one initialization occurs
/// even under concurrent first requests.
#[derive(Clone)]
pub struct LazyGraph {
    cell: Arc<OnceCell<Arc<dyn AgentGraph>>>,
    factory: GraphFactory,
}

impl LazyGraph {
    #[must_use]
    pub fn new(factory: GraphFactory) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            factory,
        }
    }

    /// Wrap an already-constructed graph. Used by tests and by callers that
    /// build the graph at startup.
    #[must_use]
    pub fn preset(graph: Arc<dyn AgentGraph>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(graph))),
            factory: Arc::new(|| {
                Err(GraphError::Init("preset graph cannot be rebuilt".to_string()))
            }),
        }
    }

    /// Get the graph, constructing it on first call.
    pub async fn get(&self) -> Result<Arc<dyn AgentGraph>, GraphError> {
        let factory = self.factory.clone();
        let graph = self
            .cell
            .get_or_try_init(|| async move { factory() })
            .await?;
        Ok(graph.clone())
    }
}
