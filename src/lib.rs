//! Graphrelay - a thin HTTP relay in front of a conversational agent graph.
//!
//! The relay resolves a session identifier per conversation, forwards chat
//! messages to an [`graph::AgentGraph`] implementation, and returns the
//! result either as a single JSON reply or as a Server-Sent-Events stream.

pub mod api;
pub mod build_info;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod server;
pub mod session;
