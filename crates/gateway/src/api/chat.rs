//! `POST /api/chat` — the streaming consultation endpoint. Frames are the
//! JSON events of [`crate::events::ChatEvent`]; every response, success or
//! error, ends with a single `done` frame before the stream closes. If the
//! client disconnects mid-stream the writes fail silently and the turn
//! task unwinds on its own.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;

use crate::engine::{run_turn, ChatPayload};
use crate::state::AppState;

pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> impl IntoResponse {
    let mut rx = run_turn(state, payload);

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok::<_, std::convert::Infallible>(Event::default().data(data)),
                Err(e) => tracing::error!(error = %e, "unserializable chat event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
