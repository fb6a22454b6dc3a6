//! Chat HTTP handlers.
//!
//! Both handlers share the same setup: validate the message, resolve the
//! session id, build the initial state and thread config (the same session
//! id goes into both), then hand off to the agent graph. The batch handler
//! awaits one final state; the streaming handler relays graph events as SSE
//! frames as they arrive.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Serialize;
use tracing::error;

use crate::api::{ChatRequest, ChatResponse, StreamParams, ToolCallRecord};
use crate::error::ChatError;
use crate::graph::{AgentState, GraphEvent, GraphStream, ThreadConfig};
use crate::server::AppState;
use crate::session;

// ============================================================================
// Batch Handler
// ============================================================================

/// POST /chat
///
/// Forwards one message to the agent graph and returns the final reply,
/// echoing the session id so the caller can resume the conversation.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return ChatError::Validation("message must not be empty".to_string()).into_response();
    }

    let session_id = session::resolve(req.session_id.as_deref());

    let graph = match state.graph.get().await {
        Ok(graph) => graph,
        Err(e) => {
            error!(error = %e, "failed to initialize agent graph");
            return ChatError::Upstream(e.to_string()).into_response();
        }
    };

    let initial = AgentState::initial(&req.message, &session_id);
    let config = ThreadConfig::new(&session_id);

    let result = match graph.invoke(initial, config).await {
        Ok(result) => result,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "agent graph invocation failed");
            return ChatError::Upstream(e.to_string()).into_response();
        }
    };

    let Some(final_message) = result.messages.last() else {
        error!(session_id = %session_id, "agent graph returned no messages");
        return ChatError::EmptyResponse.into_response();
    };

    let response_text = final_message.content.clone();

    // Flatten tool invocations in the order they appear scanning the
    // returned messages.
    let tool_calls: Vec<ToolCallRecord> = result
        .messages
        .iter()
        .flat_map(|msg| msg.tool_calls.iter().cloned())
        .map(ToolCallRecord::from)
        .collect();

    let response = ChatResponse {
        response: response_text,
        session_id,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
    };

    (StatusCode::OK, Json(response)).into_response()
}

// ============================================================================
// Streaming Handler
// ============================================================================

/// GET /chat/stream
///
/// Relays graph events to the client as SSE frames in production order.
/// Events emitted:
/// - `token`: {"content": "..."}
/// - `tool_call`: {"name": "...", "args": {...}}
/// - `done`: {}
/// - `error`: plain-text error description (terminal)
pub async fn chat_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Response {
    if params.message.trim().is_empty() {
        return ChatError::Validation("message must not be empty".to_string()).into_response();
    }

    let session_id = session::resolve(params.session_id.as_deref());
    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    let setup = async {
        let graph = state.graph.get().await?;
        let initial = AgentState::initial(&params.message, &session_id);
        let config = ThreadConfig::new(&session_id);
        graph.stream(initial, config).await
    };

    match setup.await {
        Ok(events) => Sse::new(EventRelay::new(events))
            .keep_alive(keep_alive)
            .into_response(),
        Err(e) => {
            // Failures before the first event still produce an SSE stream
            // with a single terminal error frame.
            error!(session_id = %session_id, error = %e, "agent graph stream setup failed");
            let frame = error_frame(&e.to_string());
            Sse::new(futures::stream::iter(vec![Ok::<_, Infallible>(frame)]))
                .keep_alive(keep_alive)
                .into_response()
        }
    }
}

fn error_frame(detail: &str) -> Event {
    // SSE data must be single-line.
    Event::default()
        .event("error")
        .data(detail.replace('\n', " "))
}

#[derive(Serialize)]
struct TokenData {
    content: String,
}

/// Relays graph events to the client as SSE frames, one frame per event.
///
/// No buffering, reordering, or deduplication. A producer error yields one
/// terminal `error` frame; after that (or after the producer ends) the
/// stream is closed and nothing further is written. The producer is owned
/// by this stream, so a client disconnect drops it and stops production.
struct EventRelay {
    inner: GraphStream,
    finished: bool,
}

impl EventRelay {
    fn new(inner: GraphStream) -> Self {
        Self {
            inner,
            finished: false,
        }
    }
}

impl Stream for EventRelay {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(GraphEvent::Token(content)))) => {
                let event = Event::default()
                    .event("token")
                    .json_data(TokenData { content })
                    .unwrap_or_else(|_| Event::default().event("token").data("{}"));
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Ok(GraphEvent::ToolCall(call)))) => {
                let event = Event::default()
                    .event("tool_call")
                    .json_data(&call)
                    .unwrap_or_else(|_| Event::default().event("tool_call").data("{}"));
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Ok(GraphEvent::Done))) => {
                self.finished = true;
                let event = Event::default().event("done").data("{}");
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                error!(error = %e, "agent graph stream failed");
                Poll::Ready(Some(Ok(error_frame(&e.to_string()))))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
