// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Stream demultiplexer: raw model chunks → typed scheduler events.

use std::collections::VecDeque;

use chrono::Utc;
use futures::StreamExt;
use uuid::Uuid;

use skarv_model::{
    CancellationToken, FunctionCall, ModelError, RawChunk, RawStream, UsageMetadata,
};

/// A typed event distilled from the raw model stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Thought { subject: String, description: String },
    /// A tool request.  The call id is always present: missing ids are
    /// synthesized here.
    FunctionCall(FunctionCall),
    UsageMetadata(UsageMetadata),
    Error { message: String, status: Option<u16> },
    UserCancelled,
}

/// Split a raw thought part into subject and description.
///
/// Wire convention: the subject is the first substring wrapped in `**…**`;
/// the description is the remainder with that wrapper removed.  Both are
/// trimmed.  Text without the marker becomes a description with an empty
/// subject.
pub fn parse_thought(text: &str) -> (String, String) {
    if let Some(open) = text.find("**") {
        if let Some(close_rel) = text[open + 2..].find("**") {
            let close = open + 2 + close_rel;
            let subject = text[open + 2..close].trim().to_string();
            let description = format!("{}{}", &text[..open], &text[close + 2..])
                .trim()
                .to_string();
            return (subject, description);
        }
    }
    (String::new(), text.trim().to_string())
}

/// Id of the form `<tool>-<millis>-<6 hex>` for calls the backend emitted
/// without one.
pub fn synthesize_call_id(tool_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let entropy = Uuid::new_v4().simple().to_string();
    format!("{tool_name}-{millis}-{}", &entropy[..6])
}

/// Pull-based demultiplexer over one model stream.
///
/// Emits exactly one [`StreamEvent::UserCancelled`] when the token fires
/// mid-stream, then ends.
pub struct StreamDemux {
    inner: RawStream,
    cancel: CancellationToken,
    queue: VecDeque<StreamEvent>,
    done: bool,
}

impl StreamDemux {
    pub fn new(inner: RawStream, cancel: CancellationToken) -> Self {
        Self {
            inner,
            cancel,
            queue: VecDeque::new(),
            done: false,
        }
    }

    /// Next typed event, or `None` when the stream ended.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(ev) = self.queue.pop_front() {
                return Some(ev);
            }
            if self.done {
                return None;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.done = true;
                    return Some(StreamEvent::UserCancelled);
                }
                item = self.inner.next() => match item {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(Ok(chunk)) => {
                        self.queue.extend(translate_chunk(&chunk));
                    }
                    Some(Err(ModelError::Cancelled)) => {
                        self.done = true;
                        return Some(StreamEvent::UserCancelled);
                    }
                    Some(Err(err)) => {
                        self.done = true;
                        return Some(StreamEvent::Error {
                            message: err.to_string(),
                            status: err.status_code(),
                        });
                    }
                }
            }
        }
    }
}

/// Pure chunk translation, separated out for direct testing.
pub(crate) fn translate_chunk(chunk: &RawChunk) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    for part in &chunk.parts {
        if let Some(text) = &part.text {
            if part.thought {
                let (subject, description) = parse_thought(text);
                out.push(StreamEvent::Thought {
                    subject,
                    description,
                });
            } else if !text.is_empty() {
                out.push(StreamEvent::Content(text.clone()));
            }
        }
        if let Some(call) = &part.function_call {
            let mut call = call.clone();
            if call.id.as_deref().map_or(true, str::is_empty) {
                call.id = Some(synthesize_call_id(&call.name));
            }
            out.push(StreamEvent::FunctionCall(call));
        }
    }
    if let Some(usage) = &chunk.usage {
        out.push(StreamEvent::UsageMetadata(usage.clone()));
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde_json::Map;
    use skarv_model::RawPart;

    use super::*;

    fn raw_stream(items: Vec<Result<RawChunk, ModelError>>) -> RawStream {
        Box::pin(stream::iter(items))
    }

    // ── Thought parsing ───────────────────────────────────────────────────────

    #[test]
    fn thought_subject_is_first_bold_span() {
        let (subject, description) = parse_thought("**Planning** read the files first");
        assert_eq!(subject, "Planning");
        assert_eq!(description, "read the files first");
    }

    #[test]
    fn thought_without_marker_has_empty_subject() {
        let (subject, description) = parse_thought("just thinking out loud");
        assert_eq!(subject, "");
        assert_eq!(description, "just thinking out loud");
    }

    #[test]
    fn thought_marker_mid_text_keeps_surrounding_description() {
        let (subject, description) = parse_thought("prefix **Core Idea** suffix");
        assert_eq!(subject, "Core Idea");
        assert_eq!(description, "prefix  suffix");
    }

    #[test]
    fn unclosed_marker_is_all_description() {
        let (subject, description) = parse_thought("**half open");
        assert_eq!(subject, "");
        assert_eq!(description, "**half open");
    }

    #[test]
    fn thought_fields_are_trimmed() {
        let (subject, description) = parse_thought("**  Subject  **   body   ");
        assert_eq!(subject, "Subject");
        assert_eq!(description, "body");
    }

    // ── Id synthesis ──────────────────────────────────────────────────────────

    #[test]
    fn synthesized_id_has_tool_prefix_and_hex_suffix() {
        let id = synthesize_call_id("list_dir");
        let mut parts = id.splitn(3, '-');
        assert_eq!(parts.next(), Some("list_dir"));
        let millis = parts.next().unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        let hex = parts.next().unwrap();
        assert_eq!(hex.len(), 6);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn synthesized_ids_are_unique() {
        assert_ne!(synthesize_call_id("t"), synthesize_call_id("t"));
    }

    // ── Chunk translation ─────────────────────────────────────────────────────

    #[test]
    fn text_part_becomes_content() {
        let events = translate_chunk(&RawChunk::text("hello"));
        assert_eq!(events, vec![StreamEvent::Content("hello".into())]);
    }

    #[test]
    fn empty_text_part_is_dropped() {
        let events = translate_chunk(&RawChunk::text(""));
        assert!(events.is_empty());
    }

    #[test]
    fn thought_part_becomes_thought_event() {
        let chunk = RawChunk {
            parts: vec![RawPart::thought("**Plan** step one")],
            usage: None,
        };
        let events = translate_chunk(&chunk);
        assert_eq!(
            events,
            vec![StreamEvent::Thought {
                subject: "Plan".into(),
                description: "step one".into()
            }]
        );
    }

    #[test]
    fn function_call_without_id_gets_one() {
        let chunk = RawChunk::function_call(FunctionCall {
            id: None,
            name: "grep".into(),
            args: Map::new(),
        });
        let events = translate_chunk(&chunk);
        match &events[0] {
            StreamEvent::FunctionCall(call) => {
                assert!(call.id.as_deref().unwrap().starts_with("grep-"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn existing_call_id_is_preserved() {
        let chunk = RawChunk::function_call(FunctionCall {
            id: Some("c1".into()),
            name: "grep".into(),
            args: Map::new(),
        });
        let events = translate_chunk(&chunk);
        assert!(matches!(
            &events[0],
            StreamEvent::FunctionCall(call) if call.id.as_deref() == Some("c1")
        ));
    }

    #[test]
    fn usage_is_appended_after_parts() {
        let chunk = RawChunk {
            parts: vec![RawPart::text("tail")],
            usage: Some(UsageMetadata {
                total_tokens: 5,
                ..Default::default()
            }),
        };
        let events = translate_chunk(&chunk);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StreamEvent::UsageMetadata(_)));
    }

    // ── Stream driving ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn drains_stream_in_order() {
        let mut demux = StreamDemux::new(
            raw_stream(vec![Ok(RawChunk::text("a")), Ok(RawChunk::text("b"))]),
            CancellationToken::new(),
        );
        assert_eq!(demux.next().await, Some(StreamEvent::Content("a".into())));
        assert_eq!(demux.next().await, Some(StreamEvent::Content("b".into())));
        assert_eq!(demux.next().await, None);
    }

    #[tokio::test]
    async fn stream_error_maps_to_error_event_and_ends() {
        let mut demux = StreamDemux::new(
            raw_stream(vec![
                Ok(RawChunk::text("a")),
                Err(ModelError::Status {
                    code: 500,
                    message: "boom".into(),
                }),
                Ok(RawChunk::text("never")),
            ]),
            CancellationToken::new(),
        );
        assert_eq!(demux.next().await, Some(StreamEvent::Content("a".into())));
        match demux.next().await {
            Some(StreamEvent::Error { status, .. }) => assert_eq!(status, Some(500)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(demux.next().await, None);
    }

    #[tokio::test]
    async fn cancellation_emits_exactly_one_user_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut demux = StreamDemux::new(
            raw_stream(vec![Ok(RawChunk::text("a")), Ok(RawChunk::text("b"))]),
            cancel,
        );
        assert_eq!(demux.next().await, Some(StreamEvent::UserCancelled));
        assert_eq!(demux.next().await, None);
        assert_eq!(demux.next().await, None);
    }

    #[tokio::test]
    async fn cancelled_model_error_maps_to_user_cancelled() {
        let mut demux = StreamDemux::new(
            raw_stream(vec![Err(ModelError::Cancelled)]),
            CancellationToken::new(),
        );
        assert_eq!(demux.next().await, Some(StreamEvent::UserCancelled));
        assert_eq!(demux.next().await, None);
    }
}
