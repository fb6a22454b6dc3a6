//! SSE decoding for the upstream provider's streaming responses.
//!
//! Handles byte buffering, UTF-8 conversion, line splitting (`\n` and
//! `\r\n`), and assembly of `data:` lines into events. Only the fields the
//! provider actually emits (`data:` and comments) are interpreted; anything
//! else is ignored.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// A decoded SSE event from the upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamEvent {
    pub data: String,
}

/// Stream adapter turning an upstream byte stream into SSE events.
pub struct UpstreamEventStream<S> {
    inner: S,
    buffer: String,
    data_lines: Vec<String>,
    done: bool,
}

impl<S> UpstreamEventStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: String::new(),
            data_lines: Vec::new(),
            done: false,
        }
    }

    /// Take the next complete line out of the buffer, if any.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.find('\n')?;
        let mut line = self.buffer[..end].to_string();
        self.buffer.drain(..=end);
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Feed one line into the event assembly; returns a finished event when
    /// the line was an event boundary.
    fn push_line(&mut self, line: &str) -> Option<UpstreamEvent> {
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return None;
            }
            let data = std::mem::take(&mut self.data_lines).join("\n");
            return Some(UpstreamEvent { data });
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.data_lines.push(data.to_string());
        }
        // Other fields (event:, id:, retry:) are not used by the provider.
        None
    }
}

impl<S, E> Stream for UpstreamEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<UpstreamEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            while let Some(line) = self.next_line() {
                if let Some(event) = self.push_line(&line) {
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let Ok(text) = std::str::from_utf8(&bytes) {
                        self.buffer.push_str(text);
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush a final event without a trailing blank line.
                    let rest = std::mem::take(&mut self.buffer);
                    for line in rest.lines() {
                        self.push_line(line);
                    }
                    if !self.data_lines.is_empty() {
                        let data = std::mem::take(&mut self.data_lines).join("\n");
                        return Poll::Ready(Some(Ok(UpstreamEvent { data })));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(
        chunks: Vec<&str>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + Unpin {
        futures::stream::iter(
            chunks
                .into_iter()
                .map(|s| Ok(Bytes::from(s.to_string())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn assembles_single_event() {
        let mut events = UpstreamEventStream::new(byte_stream(vec!["data: hello\n\n"]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "hello");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn joins_multiline_data() {
        let mut events =
            UpstreamEventStream::new(byte_stream(vec!["data: a\n", "data: b\n", "\n"]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "a\nb");
    }

    #[tokio::test]
    async fn handles_chunk_splits_mid_line() {
        let mut events = UpstreamEventStream::new(byte_stream(vec!["dat", "a: hel", "lo\n\n"]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "hello");
    }

    #[tokio::test]
    async fn skips_comments_and_crlf() {
        let mut events = UpstreamEventStream::new(byte_stream(vec![
            ": keep-alive\r\n",
            "data: x\r\n",
            "\r\n",
        ]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "x");
    }

    #[tokio::test]
    async fn flushes_event_at_eof_without_blank_line() {
        let mut events = UpstreamEventStream::new(byte_stream(vec!["data: tail\n"]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "tail");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let mut events = UpstreamEventStream::new(byte_stream(vec![]));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn data_without_space_after_colon() {
        let mut events = UpstreamEventStream::new(byte_stream(vec!["data:no-space\n\n"]));
        assert_eq!(events.next().await.unwrap().unwrap().data, "no-space");
    }
}
