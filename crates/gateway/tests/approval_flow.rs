//! End-to-end approval flow against an in-memory store: submit a brief
//! with liked playlists and a weekend variant, redeem the approval token,
//! and check the materialized schedule entries.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Form;
use axum::Json;

use mb_catalog::{Catalog, Playlist};
use mb_domain::brief::DayFilter;
use mb_domain::config::Config;
use mb_gateway::api::approve::approve_submit;
use mb_gateway::api::submit::{submit, SubmitPayload};
use mb_gateway::state::AppState;
use mb_store::Database;

fn catalog() -> Catalog {
    let mk = |id: &str, name: &str, desc: &str, syb: &str| Playlist {
        id: id.into(),
        name: name.into(),
        description: desc.into(),
        categories: ["bar", "lounge"].iter().map(|s| s.to_string()).collect(),
        syb_id: Some(syb.into()),
    };
    Catalog::from_playlists(vec![
        mk("golden-hour", "Golden Hour", "Warm nu-disco for sunsets", "syb:gh"),
        mk("night-drive", "Night Drive", "Deep house after dark", "syb:nd"),
        mk("weekend-lift", "Weekend Lift", "Upbeat weekend grooves", "syb:wl"),
        mk("late-glow", "Late Glow", "Slow-burn weekend closer", "syb:lg"),
    ])
}

fn test_state() -> AppState {
    AppState {
        config: Arc::new(Config::default()),
        catalog: Arc::new(catalog()),
        llm: None,
        search: None,
        platform: None,
        accounts: None,
        mailer: None,
        db: Some(Database::open_in_memory().expect("in-memory db")),
    }
}

fn submit_payload() -> SubmitPayload {
    serde_json::from_value(serde_json::json!({
        "venueName": "Sky Bar",
        "venueType": "bar-lounge",
        "location": "Bangkok",
        "contactName": "Nok",
        "contactEmail": "nok@example.com",
        "product": "syb",
        "vibes": ["sophisticated", "trendy"],
        "energy": 7,
        "hours": "17:00-23:00",
        "timezone": "Asia/Bangkok",
        "likedPlaylists": ["Golden Hour", "Night Drive"],
        "allRecommendations": [
            {
                "playlistId": "golden-hour", "playlistName": "Golden Hour",
                "playlistSybId": "syb:gh", "daypart": "opening",
                "reason": "", "matchScore": 92
            },
            {
                "playlistId": "night-drive", "playlistName": "Night Drive",
                "playlistSybId": "syb:nd", "daypart": "peak",
                "reason": "", "matchScore": 88
            }
        ],
        "weekendLikedPlaylists": ["Weekend Lift", "Late Glow"],
        "weekendRecommendations": [
            {
                "playlistId": "weekend-lift", "playlistName": "Weekend Lift",
                "playlistSybId": "syb:wl", "daypart": "opening",
                "reason": "", "matchScore": 90, "scheduleType": "weekend"
            },
            {
                "playlistId": "late-glow", "playlistName": "Late Glow",
                "playlistSybId": "syb:lg", "daypart": "peak",
                "reason": "", "matchScore": 85, "scheduleType": "weekend"
            }
        ],
        "website": ""
    }))
    .expect("payload deserializes")
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn submit_then_approve_materializes_entries() {
    let state = test_state();
    let db = state.db.clone().unwrap();

    // ── Submit ──────────────────────────────────────────────────────
    let resp = submit(State(state.clone()), Json(submit_payload())).await;
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    let brief_id = body["briefId"].as_i64().expect("brief id");
    let approval_url = body["approvalUrl"].as_str().expect("approval url");
    let token = approval_url.rsplit('/').next().unwrap().to_string();
    assert_eq!(token.len(), 64);

    // Submission persisted the brief and both follow-ups, no entries yet.
    assert!(db.entries_for_brief(brief_id).unwrap().is_empty());

    // ── Approve ─────────────────────────────────────────────────────
    let mut fields = HashMap::new();
    fields.insert("zone_Main".to_string(), "z1|Main Floor".to_string());
    let resp = approve_submit(
        State(state.clone()),
        Path(token.clone()),
        Form(fields.clone()),
    )
    .await;
    assert_eq!(resp.status(), axum::http::StatusCode::OK);

    // Two weekday + two weekend entries, venue timezone denormalized.
    let entries = db.entries_for_brief(brief_id).unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.timezone == "Asia/Bangkok"));
    assert!(entries.iter().all(|e| e.zone_id == "z1"));
    assert_eq!(
        entries.iter().filter(|e| e.days == DayFilter::Daily).count(),
        2
    );
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.days == DayFilter::Weekend)
            .count(),
        2
    );

    let venue = db.get_venue("Sky Bar").unwrap().unwrap();
    assert_eq!(venue.approved_brief_count, 1);

    // ── Second redemption is a no-op ────────────────────────────────
    let resp = approve_submit(State(state.clone()), Path(token), Form(fields)).await;
    assert_eq!(resp.status(), axum::http::StatusCode::GONE);
    assert_eq!(db.entries_for_brief(brief_id).unwrap().len(), 4);
}

#[tokio::test]
async fn honeypot_submissions_are_dropped_silently() {
    let state = test_state();
    let db = state.db.clone().unwrap();

    let mut payload = submit_payload();
    payload.website = "https://spam.example".into();
    let resp = submit(State(state), Json(payload)).await;
    let body = body_json(resp).await;

    assert_eq!(body["success"], true);
    assert!(body.get("briefId").map_or(true, |v| v.is_null()));
    assert!(db.get_venue("Sky Bar").unwrap().is_none());
}

#[tokio::test]
async fn missing_venue_name_is_rejected() {
    let state = test_state();
    let mut payload = submit_payload();
    payload.venue_name = "  ".into();
    let resp = submit(State(state), Json(payload)).await;
    assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
}
