//! Accumulation of streamed provider output.
//!
//! Providers stream server-sent events. Nothing downstream consumes partial
//! text, so every stream is drained into one string before it is returned.

use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use subjecttree_core::{Result, SubjectTreeError};

/// Incremental decoder for `text/event-stream` bodies.
///
/// Yields the payload of every `data:` line. Chunk boundaries may fall
/// anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(data) = data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).to_string())
}

/// Concatenate text fragments in arrival order until the stream ends.
///
/// The first failed fragment aborts accumulation.
pub async fn accumulate_text<S>(fragments: S) -> Result<String>
where
    S: Stream<Item = Result<String>>,
{
    let mut fragments = Box::pin(fragments);
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

struct SseState<S, F> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    queue: VecDeque<String>,
    extract: F,
    finished: bool,
}

/// Turn a raw SSE byte stream into a stream of text deltas.
///
/// `extract` maps one `data:` payload to the text it carries, `None` for
/// events without text. A `[DONE]` payload ends the stream.
pub fn sse_text_stream<S, B, E, F>(body: S, extract: F) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str) -> Result<Option<String>>,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        queue: VecDeque::new(),
        extract,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(data) = st.queue.pop_front() {
                if data.trim() == "[DONE]" {
                    st.queue.clear();
                    st.finished = true;
                    continue;
                }
                match (st.extract)(&data) {
                    Ok(Some(text)) => return Some((Ok(text), st)),
                    Ok(None) => continue,
                    Err(e) => {
                        st.queue.clear();
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.push(chunk.as_ref());
                    st.queue.extend(payloads);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((
                        Err(SubjectTreeError::Transport(format!(
                            "stream interrupted: {}",
                            e
                        ))),
                        st,
                    ));
                }
                None => {
                    st.finished = true;
                    if let Some(last) = st.decoder.finish() {
                        st.queue.push_back(last);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: delta\nda").is_empty());
        assert_eq!(decoder.push(b"ta: {\"a\":1}\r\n\ndata:x\n"), vec!["{\"a\":1}", "x"]);
        assert!(decoder.push(b": keep-alive\n").is_empty());
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn test_decoder_handles_split_utf8() {
        let bytes = "data: é\n".as_bytes();
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..7]).is_empty());
        assert_eq!(decoder.push(&bytes[7..]), vec!["é"]);
    }

    #[test]
    fn test_accumulate_in_arrival_order() {
        let fragments = stream::iter(vec![
            Ok("{\"name\"".to_string()),
            Ok(":\"X\",\"children\":[]}".to_string()),
        ]);
        let text = tokio_test::block_on(accumulate_text(fragments)).unwrap();
        assert_eq!(text, r#"{"name":"X","children":[]}"#);
    }

    #[tokio::test]
    async fn test_accumulate_stops_on_error() {
        let fragments = stream::iter(vec![
            Ok("{".to_string()),
            Err(SubjectTreeError::Transport("reset".into())),
            Ok("}".to_string()),
        ]);
        assert!(matches!(
            accumulate_text(fragments).await,
            Err(SubjectTreeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_sse_text_stream_until_done() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"t\":\"Hel\"}\n\ndata: {\"t\"".to_vec()),
            Ok(b":\"lo\"}\n\ndata: {\"other\":1}\n\ndata: [DONE]\n\ndata: {\"t\":\"!\"}\n".to_vec()),
        ];
        let deltas = sse_text_stream(stream::iter(chunks), |data| {
            let value: serde_json::Value = serde_json::from_str(data)?;
            Ok(value["t"].as_str().map(str::to_string))
        });
        assert_eq!(accumulate_text(deltas).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_sse_body_error_is_transport() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"t\":\"a\"}\n".to_vec()),
            Err("connection reset".to_string()),
        ];
        let deltas = sse_text_stream(stream::iter(chunks), |data| {
            let value: serde_json::Value = serde_json::from_str(data)?;
            Ok(value["t"].as_str().map(str::to_string))
        });
        let err = accumulate_text(deltas).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
