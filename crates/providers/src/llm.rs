//! LLM adapter for the Messages API: system prompt in a top-level field,
//! content as typed blocks, tool use signalled through `stop_reason`.
//! Supports one-shot requests (the tool loop) and token-delta streaming
//! (the recommendation narration), both behind the overload-retry policy.

use serde_json::Value;

use mb_domain::llm::{ChatMessage, ChatOutcome, ContentBlock, ToolDefinition};
use mb_domain::stream::{BoxStream, StreamEvent};
use mb_domain::{Error, Result};

use crate::sse::into_event_stream;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Retries on HTTP 529, with 1s/2s/4s/8s backoff.
const MAX_OVERLOAD_RETRIES: u32 = 3;
const BACKOFF_CAP_SECS: u64 = 8;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub tools: Vec<ToolDefinition>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn build_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": req.max_tokens,
            "messages": req.messages,
            "stream": stream,
        });
        if !req.system.is_empty() {
            body["system"] = Value::String(req.system.clone());
        }
        if !req.tools.is_empty() {
            body["tools"] = serde_json::to_value(&req.tools).unwrap_or(Value::Null);
        }
        body
    }

    async fn post_messages(&self, body: &Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Llm {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(resp)
    }

    /// One non-streaming completion, with overload retries.
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatOutcome> {
        let body = self.build_body(req, false);
        with_overload_retry(|| async {
            let resp = self.post_messages(&body).await?;
            let json: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
            parse_outcome(&json)
        })
        .await
    }

    /// Token-delta streaming completion, with overload retries on the
    /// initial connect (a failure mid-stream is surfaced as a stream
    /// error, not retried).
    pub async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_body(req, true);
        let resp = with_overload_retry(|| self.post_messages(&body)).await?;
        Ok(into_event_stream(resp, parse_stream_payload))
    }
}

/// Run `op`, retrying on the provider's transient overload status with
/// exponential backoff (1s, 2s, 4s, capped at 8s).
async fn with_overload_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_overloaded() && attempt < MAX_OVERLOAD_RETRIES => {
                let delay = (1u64 << attempt).min(BACKOFF_CAP_SECS);
                tracing::warn!(attempt, delay_s = delay, "LLM overloaded, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn parse_outcome(body: &Value) -> Result<ChatOutcome> {
    let content: Vec<ContentBlock> = body
        .get("content")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    let stop_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(ChatOutcome {
        content,
        stop_reason,
    })
}

/// Parse one streaming SSE payload. Only text deltas and the terminal
/// events matter on this path; tool-use assembly stays on the
/// non-streaming call.
fn parse_stream_payload(data: &str) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(|t| t.as_str()).unwrap_or("") {
        "content_block_delta" => {
            let text = v
                .get("delta")
                .filter(|d| d.get("type").and_then(|t| t.as_str()) == Some("text_delta"))
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("");
            if text.is_empty() {
                vec![]
            } else {
                vec![Ok(StreamEvent::Token {
                    text: text.to_string(),
                })]
            }
        }
        "message_delta" => {
            match v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|s| s.as_str())
            {
                Some(reason) => vec![Ok(StreamEvent::Done {
                    stop_reason: Some(reason.to_string()),
                })],
                None => vec![],
            }
        }
        "message_stop" => vec![Ok(StreamEvent::Done { stop_reason: None })],
        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown stream error")
                .to_string();
            vec![Ok(StreamEvent::Error { message })]
        }
        // ping, message_start, content_block_start/stop
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_outcome_reads_blocks_and_stop_reason() {
        let body = serde_json::json!({
            "content": [
                {"type": "text", "text": "Let me look that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "research_venue",
                 "input": {"queries": ["Azure Resort Phuket"]}}
            ],
            "stop_reason": "tool_use",
        });
        let outcome = parse_outcome(&body).unwrap();
        assert!(outcome.wants_tools());
        let uses = outcome.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "research_venue");
        assert_eq!(outcome.text(), "Let me look that up.");
    }

    #[test]
    fn parse_outcome_tolerates_missing_fields() {
        let outcome = parse_outcome(&serde_json::json!({})).unwrap();
        assert!(outcome.content.is_empty());
        assert!(!outcome.wants_tools());
    }

    #[test]
    fn stream_payload_extracts_text_deltas() {
        let events = parse_stream_payload(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Token { text } if text == "Hel"
        ));
    }

    #[test]
    fn stream_payload_ignores_pings_and_block_starts() {
        assert!(parse_stream_payload(r#"{"type":"ping"}"#).is_empty());
        assert!(parse_stream_payload(
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#
        )
        .is_empty());
    }

    #[test]
    fn stream_payload_emits_done_on_stop() {
        let events = parse_stream_payload(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":12}}"#,
        );
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Done { stop_reason: Some(r) } if r == "end_turn"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn overload_retry_gives_up_after_cap() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = with_overload_retry(|| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Err(Error::Llm {
                    status: 529,
                    message: "overloaded".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_overload_errors_do_not_retry() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = with_overload_retry(|| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Err(Error::Llm {
                    status: 400,
                    message: "bad request".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
