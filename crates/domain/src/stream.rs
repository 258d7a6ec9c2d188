use serde::Serialize;
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while streaming an LLM response. The chat surface only
/// streams plain narration (the tool loop itself runs non-streaming), so
/// token deltas are all that is needed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// Stream is finished.
    #[serde(rename = "done")]
    Done { stop_reason: Option<String> },

    /// An error occurred mid-stream.
    #[serde(rename = "error")]
    Error { message: String },
}
