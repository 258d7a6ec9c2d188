//! `GET /follow-up/track/:id` — the email open-tracking pixel. Always a
//! 200 with a 1×1 transparent GIF; the open mark is recorded off the
//! request path and every failure is swallowed.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;

use crate::state::AppState;

/// 1×1 transparent GIF89a.
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1×1, palette follows
    0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, // black, white
    0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // transparency extension
    0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // pixel data
    0x3B, // trailer
];

pub async fn pixel(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
) -> impl IntoResponse {
    if let Some(db) = state.db.clone() {
        tokio::spawn(async move {
            if let Err(e) = db.mark_follow_up_opened(&tracking_id, Utc::now()) {
                tracing::debug!(tracking_id, error = %e, "open mark failed");
            }
        });
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        PIXEL_GIF,
    )
}
