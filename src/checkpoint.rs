//! Conversation checkpoint capability.
//!
//! Persistence across conversation turns is currently disabled: the relay
//! runs with [`Checkpointer::NoOp`], which satisfies the full interface but
//! stores nothing. A resumed session id therefore does NOT recall prior
//! turns; conversation memory exists only within one graph execution.
//! Swapping in [`Checkpointer::Durable`] requires no call-site changes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::graph::AgentState;

/// Errors raised by a durable checkpoint backend.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint serialization failed: {0}")]
    Serialization(String),

    #[error("checkpoint storage failed: {0}")]
    Storage(String),
}

/// A durable store for conversation state keyed by thread id.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Persist the state for a thread, replacing any previous checkpoint.
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError>;

    /// Load the latest state for a thread, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError>;
}

/// The checkpoint capability handed to the graph.
#[derive(Clone)]
pub enum Checkpointer {
    /// Persistence disabled. Saves succeed and discard; loads find nothing.
    NoOp,
    /// Persistence backed by an external store.
    Durable(Arc<dyn CheckpointBackend>),
}

impl Checkpointer {
    pub async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError> {
        match self {
            Checkpointer::NoOp => Ok(()),
            Checkpointer::Durable(backend) => backend.save(thread_id, state).await,
        }
    }

    pub async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        match self {
            Checkpointer::NoOp => Ok(None),
            Checkpointer::Durable(backend) => backend.load(thread_id).await,
        }
    }
}
