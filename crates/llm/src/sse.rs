//! Server-sent-event decoding for streamed completions.

use std::collections::VecDeque;
use std::pin::Pin;

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

/// Event vocabulary of a provider's streaming endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `choices[0].delta.content` chunks terminated by `data: [DONE]`.
    ChatCompletions,
    /// `content_block_delta` events terminated by `message_stop`.
    AnthropicMessages,
}

/// Turns raw event-stream bytes into text fragments.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multi-byte character.
#[derive(Debug)]
pub struct SseDecoder {
    format: StreamFormat,
    pending: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Whether the completion sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(chunk);
        let mut fragments = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            if self.finished {
                self.pending.clear();
                break;
            }
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = std::str::from_utf8(&line).context("event stream is not valid utf-8")?;
            if let Some(fragment) = self.decode_line(line.trim_end_matches(['\r', '\n']))? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<String>> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim_start();
        if data.is_empty() {
            return Ok(None);
        }
        if self.format == StreamFormat::ChatCompletions && data == "[DONE]" {
            self.finished = true;
            return Ok(None);
        }
        let value: Value = serde_json::from_str(data).context("failed to decode stream event")?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(anyhow!("provider reported an error mid-stream: {message}"));
        }
        let text = match self.format {
            StreamFormat::ChatCompletions => value
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str),
            StreamFormat::AnthropicMessages => match value.get("type").and_then(Value::as_str) {
                Some("content_block_delta") => value.pointer("/delta/text").and_then(Value::as_str),
                Some("message_stop") => {
                    self.finished = true;
                    None
                }
                _ => None,
            },
        };
        Ok(text.filter(|t| !t.is_empty()).map(str::to_string))
    }
}

struct FragmentState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    queue: VecDeque<String>,
    done: bool,
}

/// Text fragments of an event-stream body.
///
/// The stream ends cleanly only after the completion sentinel; a body that
/// closes early or carries an error event ends with a single `Err`.
pub fn sse_fragments<S, B, E>(body: S, format: StreamFormat) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = FragmentState {
        body: Box::pin(body),
        decoder: SseDecoder::new(format),
        queue: VecDeque::new(),
        done: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.queue.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.done || st.decoder.is_finished() {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => match st.decoder.feed(chunk.as_ref()) {
                    Ok(fragments) => st.queue.extend(fragments),
                    Err(err) => {
                        st.done = true;
                        return Some((Err(err), st));
                    }
                },
                Some(Err(err)) => {
                    st.done = true;
                    let err = anyhow::Error::new(err).context("stream interrupted");
                    return Some((Err(err), st));
                }
                None => {
                    st.done = true;
                    return Some((Err(anyhow!("stream closed before completion")), st));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
        )
    }

    #[test]
    fn decodes_chat_completion_deltas() {
        let mut decoder = SseDecoder::new(StreamFormat::ChatCompletions);
        let body = format!(
            "{}{}: keep-alive\n{}data: [DONE]\n\n",
            openai_chunk("{\"errors\":"),
            openai_chunk("[]}"),
            openai_chunk(""),
        );
        let fragments = decoder.feed(body.as_bytes()).unwrap();
        assert_eq!(fragments, ["{\"errors\":", "[]}"]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn lines_split_across_chunks_and_characters() {
        let mut decoder = SseDecoder::new(StreamFormat::ChatCompletions);
        let body = openai_chunk("café");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;
        assert!(decoder.feed(&bytes[..split]).unwrap().is_empty());
        assert_eq!(decoder.feed(&bytes[split..]).unwrap(), ["café"]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn decodes_anthropic_events() {
        let mut decoder = SseDecoder::new(StreamFormat::AnthropicMessages);
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"[{\\\"word\\\"\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        assert_eq!(decoder.feed(body.as_bytes()).unwrap(), ["[{\"word\""]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn error_events_fail_the_decoder() {
        let mut decoder = SseDecoder::new(StreamFormat::AnthropicMessages);
        let body = "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n";
        let err = decoder.feed(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn body_without_sentinel_ends_in_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
            vec![Ok(openai_chunk("partial").into_bytes())];
        let items: Vec<Result<String>> =
            sse_fragments(stream::iter(chunks), StreamFormat::ChatCompletions)
                .collect()
                .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn body_with_sentinel_ends_cleanly() {
        let body = format!("{}{}data: [DONE]\n\n", openai_chunk("a"), openai_chunk("b"));
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        let items: Vec<String> = sse_fragments(stream::iter(chunks), StreamFormat::ChatCompletions)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, ["a", "b"]);
    }
}
