//! Line-oriented decoding of the `alt=sse` response body.
//!
//! Only `data:` lines are looked at. Blank payloads and `[DONE]` are
//! skipped; every non-empty text part of the first candidate becomes one
//! delta as soon as its line is complete. A payload that is not valid JSON
//! ends the stream with a malformed failure.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use gemini_relay_types::protocol::gemini::StreamChunk;
use tracing::{debug, error};

use crate::relay::retry::UpstreamFailure;

/// Text deltas of one upstream response, in upstream order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamFailure>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Skip,
    Deltas(Vec<String>),
    Malformed(String),
}

pub(crate) fn parse_line(raw: &[u8]) -> LineOutcome {
    let Ok(line) = std::str::from_utf8(raw) else {
        return LineOutcome::Malformed("invalid UTF-8 in stream line".to_string());
    };
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return LineOutcome::Skip;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let deltas: Vec<String> = chunk.text_parts().map(str::to_string).collect();
            if deltas.is_empty() {
                LineOutcome::Skip
            } else {
                LineOutcome::Deltas(deltas)
            }
        },
        Err(e) => LineOutcome::Malformed(format!("invalid stream payload: {}", e)),
    }
}

/// Decode a streamed response body into text deltas.
pub fn text_deltas<S>(mut body: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer = BytesMut::new();

        loop {
            let bytes = match body.next().await {
                Some(Ok(b)) => b,
                Some(Err(e)) => {
                    let failure = UpstreamFailure::transport(e);
                    error!(class = failure.class.as_str(), detail = %failure.detail, "Upstream stream interrupted");
                    yield Err(failure);
                    return;
                },
                None => break,
            };

            buffer.extend_from_slice(&bytes);
            if buffer.len() > MAX_BUFFER_SIZE {
                error!(size = buffer.len(), "Stream line exceeds buffer limit");
                yield Err(UpstreamFailure::malformed("stream line exceeds buffer limit"));
                return;
            }

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.split_to(pos + 1);
                match parse_line(&line) {
                    LineOutcome::Skip => continue,
                    LineOutcome::Deltas(deltas) => {
                        for delta in deltas {
                            yield Ok(delta);
                        }
                    },
                    LineOutcome::Malformed(detail) => {
                        error!(%detail, "Malformed stream line");
                        yield Err(UpstreamFailure::malformed(detail));
                        return;
                    },
                }
            }
        }

        // Last line may arrive without a trailing newline
        if !buffer.is_empty() {
            match parse_line(&buffer) {
                LineOutcome::Skip => {},
                LineOutcome::Deltas(deltas) => {
                    for delta in deltas {
                        yield Ok(delta);
                    }
                },
                LineOutcome::Malformed(detail) => {
                    yield Err(UpstreamFailure::malformed(detail));
                    return;
                },
            }
        }
        debug!("Upstream stream finished");
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin + Send {
        let owned: Vec<Result<Bytes, reqwest::Error>> =
            chunks.iter().map(|c| Ok(Bytes::from(c.to_string()))).collect();
        stream::iter(owned)
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line(b"\n"), LineOutcome::Skip);
        assert_eq!(parse_line(b": keep-alive\n"), LineOutcome::Skip);
        assert_eq!(parse_line(b"event: message\n"), LineOutcome::Skip);
        assert_eq!(parse_line(b"data: [DONE]\n"), LineOutcome::Skip);
        assert_eq!(parse_line(b"data:   \n"), LineOutcome::Skip);
        assert_eq!(
            parse_line(br#"data: {"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#),
            LineOutcome::Deltas(vec!["Hi".to_string()])
        );
        assert!(matches!(parse_line(b"data: {not json"), LineOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn test_deltas_across_chunk_boundaries() {
        let deltas: Vec<_> = text_deltas(body(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"te",
            "xt\":\"Hel\"}]}}]}\r\n\r\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]}}]}\n",
            "data: [DONE]",
        ]))
        .collect()
        .await;

        let texts: Vec<String> = deltas.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_line_aborts_stream() {
        let items: Vec<_> = text_deltas(body(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n",
            "data: {broken\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"never\"}]}}]}\n",
        ]))
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref(), Ok("ok"));
        let failure = items[1].clone().unwrap_err();
        assert!(failure.malformed);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_parsed() {
        let items: Vec<_> = text_deltas(body(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"tail\"}]}}]}",
        ]))
        .collect()
        .await;
        assert_eq!(items, vec![Ok("tail".to_string())]);
    }
}
