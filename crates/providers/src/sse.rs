//! Minimal server-sent-events plumbing for the LLM streaming response:
//! split the byte stream into `data:` payloads and hand each one to a
//! parser closure that yields zero or more stream events.

use mb_domain::stream::{BoxStream, StreamEvent};
use mb_domain::Result;

/// Pull complete `data:` payloads out of an SSE buffer. Events are
/// separated by a blank line; `event:`/`id:`/`retry:` lines are ignored.
/// Consumed bytes are drained, a trailing partial event stays buffered.
pub(crate) fn split_sse_data(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(boundary) = buffer.find("\n\n") {
        let event: String = buffer.drain(..boundary + 2).collect();
        for line in event.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
    }
    payloads
}

/// Wrap an SSE `reqwest::Response` into a stream of events, feeding each
/// `data:` payload through `parse`. A final `Done` is synthesized if the
/// body closes without one.
pub(crate) fn into_event_stream<F>(
    response: reqwest::Response,
    mut parse: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for payload in split_sse_data(&mut buffer) {
                        for event in parse(&payload) {
                            done = done || matches!(event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed; flush any buffered partial event.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for payload in split_sse_data(&mut buffer) {
                            for event in parse(&payload) {
                                done = done || matches!(event, Ok(StreamEvent::Done { .. }));
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(mb_domain::Error::Http(e.to_string()));
                    break;
                }
            }
        }

        if !done {
            yield Ok(StreamEvent::Done { stop_reason: None });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_events() {
        let mut buf = String::from("event: delta\ndata: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(split_sse_data(&mut buf), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn keeps_partial_event_buffered() {
        let mut buf = String::from("data: whole\n\ndata: par");
        assert_eq!(split_sse_data(&mut buf), vec!["whole"]);
        assert_eq!(buf, "data: par");

        buf.push_str("tial\n\n");
        assert_eq!(split_sse_data(&mut buf), vec!["partial"]);
    }

    #[test]
    fn ignores_non_data_fields_and_blank_data() {
        let mut buf = String::from("id: 9\nretry: 300\ndata: \n\ndata: kept\n\n");
        assert_eq!(split_sse_data(&mut buf), vec!["kept"]);
    }
}
