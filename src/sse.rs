//! Server-sent event framing for `/query_stream`.
//!
//! Frames are `event:` / `data:` line groups terminated by a blank line. Data
//! that is not JSON is wrapped as `{"raw": "<data>"}`. The stream ends after the
//! first `done` event or at EOF.

use futures::{stream, Stream, StreamExt};
use serde_json::Value;

use crate::transport::ByteStream;
use crate::types::{StreamEvent, StreamEventKind};
use crate::{Error, Result};

const DEFAULT_EVENT: &str = "message";

#[derive(Default)]
struct Frame {
    event: Option<String>,
    data: Vec<String>,
}

impl Frame {
    /// Feed one line. Returns a finished event on the blank line closing a frame.
    fn push_line(&mut self, line: &str) -> Option<StreamEvent> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return self.finish();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.data.push(rest.trim().to_string());
        }
        None
    }

    fn finish(&mut self) -> Option<StreamEvent> {
        let frame = std::mem::take(self);
        let empty = frame.data.iter().all(|d| d.is_empty());
        if empty && frame.event.is_none() {
            return None;
        }
        let raw = frame.data.join("\n");
        let data = if empty {
            Value::Object(Default::default())
        } else {
            serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| serde_json::json!({ "raw": raw }))
        };
        let name = frame.event.as_deref().unwrap_or(DEFAULT_EVENT);
        Some(StreamEvent {
            kind: StreamEventKind::parse(name),
            data,
        })
    }
}

struct State {
    input: ByteStream,
    buf: Vec<u8>,
    frame: Frame,
    finished: bool,
}

/// Decode a byte stream into events.
pub(crate) fn decode_events(input: ByteStream) -> impl Stream<Item = Result<StreamEvent>> + Send {
    let state = State {
        input,
        buf: Vec::new(),
        frame: Frame::default(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            // Drain complete lines already buffered.
            while let Some(idx) = st.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=idx).collect();
                let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                if let Some(event) = st.frame.push_line(&line) {
                    if event.is_done() {
                        st.finished = true;
                    }
                    return Some((Ok(event), st));
                }
            }

            match st.input.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(Error::Transport(e)), st));
                }
                None => {
                    st.finished = true;
                    let tail = std::mem::take(&mut st.buf);
                    if !tail.is_empty() {
                        st.frame.push_line(&String::from_utf8_lossy(&tail));
                    }
                    return st.frame.finish().map(|event| (Ok(event), st));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use bytes::Bytes;

    fn chunks(parts: &[&'static str]) -> ByteStream {
        let items: Vec<std::result::Result<Bytes, TransportError>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(parts: &[&'static str]) -> Vec<StreamEvent> {
        decode_events(chunks(parts))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_named_events_across_chunk_boundaries() {
        let events = collect(&[
            "event: text\ndata: {\"cont",
            "ent\": \"Hel\"}\n\nevent: text\ndata: {\"content\": \"lo\"}\n",
            "\nevent: metadata\ndata: {\"confidence\": 0.9}\n\n",
        ])
        .await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].content(), "Hel");
        assert_eq!(events[1].content(), "lo");
        assert_eq!(events[2].kind, StreamEventKind::Metadata);
        assert_eq!(events[2].data["confidence"], 0.9);
    }

    #[tokio::test]
    async fn stops_after_done() {
        let events = collect(&[
            "event: text\ndata: {\"content\": \"a\"}\n\n",
            "event: done\ndata: {}\n\n",
            "event: text\ndata: {\"content\": \"ignored\"}\n\n",
        ])
        .await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_done());
    }

    #[tokio::test]
    async fn done_without_data_still_ends_the_stream() {
        let events = collect(&["event: done\n\n", "event: text\ndata: {\"content\": \"late\"}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_done());
        assert!(events[0].data.as_object().map_or(false, |o| o.is_empty()));
    }

    #[tokio::test]
    async fn non_json_data_is_wrapped_and_default_event_is_message() {
        let events = collect(&["data: plain words\r\n\r\n", ": keep-alive\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StreamEventKind::Other("message".into()));
        assert_eq!(events[0].data["raw"], "plain words");
    }

    #[tokio::test]
    async fn trailing_frame_without_blank_line_is_flushed() {
        let events = collect(&["event: error\ndata: {\"message\": \"boom\"}"]).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[tokio::test]
    async fn transport_failure_mid_stream_surfaces_once() {
        let items: Vec<std::result::Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"event: text\ndata: {\"content\": \"x\"}\n\n")),
            Err(TransportError::Other("reset".into())),
        ];
        let out: Vec<_> = decode_events(Box::pin(stream::iter(items))).collect().await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(Error::Transport(_))));
    }
}
