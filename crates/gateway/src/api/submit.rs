//! `POST /submit` — turn a finished consultation into a persisted brief,
//! an approval link (or an auto-scheduled set of entries), follow-ups, an
//! optional pre-built remote schedule, and the internal email.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Deserialize;
use serde_json::Value;

use mb_catalog::dayparts::generate_dayparts;
use mb_catalog::designer::build_designer_brief;
use mb_domain::brief::{DayFilter, Daypart, Dayparts, DesignerBrief, Recommendation, ScheduleData};
use mb_store::{Database, FollowUpKind, NewBrief};

use super::api_error;
use crate::emails::{submission_email, SubmissionEmail};
use crate::schedule_build::{build_liked_slots, build_schedule_plan, entries_from_schedule_data, DEFAULT_ZONE};
use crate::state::AppState;

const TOKEN_VALID_DAYS: i64 = 7;
const SUMMARY_MAX_CHARS: usize = 4000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitPayload {
    pub venue_name: String,
    pub venue_type: String,
    pub location: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub product: String,
    pub vibes: Vec<String>,
    pub energy: Option<u8>,
    pub hours: String,
    pub vocals: String,
    pub avoid_list: String,
    pub guest_profile: String,
    pub age_range: String,
    pub nationality: String,
    pub mood_changes: String,
    pub liked_playlists: Vec<String>,
    pub all_recommendations: Vec<Recommendation>,
    /// Dayparts as shown to the customer; overrides regeneration.
    pub dayparts_metadata: Option<Dayparts>,
    pub extracted_brief: Value,
    pub conversation_summary: String,
    pub multi_zone: bool,
    pub zone_names: Vec<String>,
    pub weekend_dayparts: Option<Dayparts>,
    pub weekend_recommendations: Vec<Recommendation>,
    pub weekend_liked_playlists: Vec<String>,
    pub syb_account_id: Option<String>,
    pub timezone: Option<String>,
    /// Honeypot. Humans never fill this.
    pub website: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmitPayload>,
) -> Response {
    // Honeypot: answer as if everything worked, persist nothing.
    if !payload.website.trim().is_empty() {
        tracing::info!("honeypot tripped; dropping submission");
        return Json(serde_json::json!({ "success": true })).into_response();
    }
    if payload.venue_name.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "venueName is required");
    }

    let energy = payload.energy.unwrap_or(5).clamp(1, 10);
    let (schedule_data, designer_brief) = assemble_schedule(&state, &payload, energy);
    let primary_parts: Vec<Daypart> = schedule_data
        .dayparts
        .zones()
        .first()
        .map(|(_, parts)| parts.to_vec())
        .unwrap_or_default();

    let is_syb = payload.product != "beatbreeze";
    let mut brief_id: Option<i64> = None;
    let mut approval_url: Option<String> = None;
    let mut auto_scheduled = false;
    let mut schedule_prebuilt = false;

    if is_syb {
        if let Some(db) = &state.db {
            match persist_submission(&state, db, &payload, &schedule_data, &designer_brief, energy)
                .await
            {
                Ok(outcome) => {
                    brief_id = Some(outcome.brief_id);
                    approval_url = outcome.approval_url;
                    auto_scheduled = outcome.auto_scheduled;
                    schedule_prebuilt = outcome.schedule_prebuilt;
                }
                Err(e) => {
                    tracing::error!(error = %e, "submission persistence failed");
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not save the brief");
                }
            }
        } else {
            tracing::warn!("no database configured; submission is email-only");
        }
    }

    // The internal email goes out on every path. An SMTP failure is a 5xx
    // the caller retries by resubmitting; a duplicate brief is acceptable.
    if let Some(mailer) = &state.mailer {
        let (subject, html) = submission_email(&SubmissionEmail {
            brief_id,
            venue_name: &payload.venue_name,
            venue_type: &payload.venue_type,
            location: &payload.location,
            contact_name: &payload.contact_name,
            contact_email: &payload.contact_email,
            designer_brief: &designer_brief,
            dayparts: &primary_parts,
            approval_url: approval_url.as_deref(),
            schedule_prebuilt,
            auto_scheduled,
        });
        if let Err(e) = mailer
            .send_html(&state.config.notify_email, &subject, html)
            .await
        {
            tracing::error!(error = %e, "submission email failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "email dispatch failed");
        }
    }

    tracing::info!(
        venue = %payload.venue_name,
        brief_id = ?brief_id,
        auto_scheduled,
        "brief submitted"
    );
    Json(serde_json::json!({
        "success": true,
        "briefId": brief_id,
        "approvalUrl": approval_url,
        "autoScheduled": auto_scheduled,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the persisted schedule data and designer brief from the raw
/// payload: dayparts (client metadata wins over regeneration), liked
/// slots for both the weekday set and the weekend variant.
fn assemble_schedule(
    state: &AppState,
    payload: &SubmitPayload,
    energy: u8,
) -> (ScheduleData, DesignerBrief) {
    let dayparts = payload
        .dayparts_metadata
        .clone()
        .unwrap_or_else(|| Dayparts::Single(generate_dayparts(&payload.hours, energy)));

    let mut liked = build_liked_slots(
        &payload.liked_playlists,
        &payload.all_recommendations,
        &dayparts,
        DayFilter::Daily,
        &state.catalog,
    );
    if !payload.weekend_liked_playlists.is_empty() {
        let weekend_parts = payload.weekend_dayparts.as_ref().unwrap_or(&dayparts);
        liked.extend(build_liked_slots(
            &payload.weekend_liked_playlists,
            &payload.weekend_recommendations,
            weekend_parts,
            DayFilter::Weekend,
            &state.catalog,
        ));
    }

    let zone_names = if payload.zone_names.is_empty() {
        vec![DEFAULT_ZONE.to_string()]
    } else {
        payload.zone_names.clone()
    };
    let primary: Vec<Daypart> = dayparts
        .zones()
        .first()
        .map(|(_, parts)| parts.to_vec())
        .unwrap_or_default();
    let daypart_order = primary.iter().map(|p| p.key.clone()).collect();

    let designer_brief =
        build_designer_brief(&payload.vibes, &payload.venue_type, energy, &primary);
    let schedule_data = ScheduleData {
        dayparts,
        daypart_order,
        zone_names,
        liked,
        weekend_dayparts: payload.weekend_dayparts.clone(),
    };
    (schedule_data, designer_brief)
}

struct PersistOutcome {
    brief_id: i64,
    approval_url: Option<String>,
    auto_scheduled: bool,
    schedule_prebuilt: bool,
}

async fn persist_submission(
    state: &AppState,
    db: &Database,
    payload: &SubmitPayload,
    schedule_data: &ScheduleData,
    designer_brief: &DesignerBrief,
    energy: u8,
) -> anyhow::Result<PersistOutcome> {
    let summary = truncate_chars(&payload.conversation_summary, SUMMARY_MAX_CHARS);

    let raw_data = serde_json::json!({
        "extractedBrief": payload.extracted_brief,
        "designerBrief": designer_brief,
        "vibes": payload.vibes,
        "energy": energy,
        "hours": payload.hours,
        "vocals": payload.vocals,
        "avoidList": payload.avoid_list,
        "guestProfile": payload.guest_profile,
        "ageRange": payload.age_range,
        "nationality": payload.nationality,
        "moodChanges": payload.mood_changes,
        "multiZone": payload.multi_zone,
    });

    let brief_id = db.insert_brief(&NewBrief {
        venue_name: payload.venue_name.clone(),
        venue_type: payload.venue_type.clone(),
        location: payload.location.clone(),
        contact_name: payload.contact_name.clone(),
        contact_email: payload.contact_email.clone(),
        contact_phone: payload.contact_phone.clone(),
        product: payload.product.clone(),
        liked_playlist_ids: payload.liked_playlists.clone(),
        conversation_summary: summary,
        raw_data,
        schedule_data: Some(schedule_data.clone()),
        syb_account_id: payload.syb_account_id.clone(),
        automation_tier: None,
    })?;

    let venue = db.upsert_venue(
        &payload.venue_name,
        &payload.location,
        &payload.venue_type,
        payload.syb_account_id.as_deref(),
        payload.timezone.as_deref(),
        brief_id,
    )?;

    // Pre-build the remote schedule when the platform account is already
    // confirmed. Failures fall back to the manual approval path.
    let mut schedule_prebuilt = false;
    if let (Some(account_id), Some(platform)) =
        (payload.syb_account_id.as_deref(), &state.platform)
    {
        let plan = build_schedule_plan(brief_id, &payload.venue_name, account_id, schedule_data);
        if !plan.slots.is_empty() {
            match platform.create_schedule(&plan).await {
                Ok(schedule_id) => {
                    db.set_remote_schedule(brief_id, &schedule_id)?;
                    schedule_prebuilt = true;
                    if let Err(e) = platform.add_to_music_library(account_id, &schedule_id).await
                    {
                        tracing::warn!(error = %e, "addToMusicLibrary failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "remote schedule pre-build failed"),
            }
        }
    }

    // Auto-schedule: venues with the flag, enough approved history, and
    // learned zone mappings skip the human approval step.
    let mappings = db.zone_mappings(&payload.venue_name)?;
    let eligible = venue.auto_schedule && venue.approved_brief_count >= 2 && !mappings.is_empty();

    let (approval_url, auto_scheduled) = if eligible {
        let entries = entries_from_schedule_data(schedule_data, &mappings, &venue.timezone);
        db.insert_schedule_entries(brief_id, &entries)?;
        db.advance_brief_status(brief_id, mb_domain::brief::BriefStatus::Approved)?;
        db.increment_venue_approved(&payload.venue_name)?;
        tracing::info!(brief_id, entries = entries.len(), "auto-scheduled");
        (None, true)
    } else {
        let token = new_approval_token();
        db.create_approval_token(brief_id, &token, Utc::now() + Duration::days(TOKEN_VALID_DAYS))?;
        (Some(state.external_url(&format!("/approve/{token}"))), false)
    };

    if !payload.contact_email.trim().is_empty() {
        db.create_follow_up(
            brief_id,
            FollowUpKind::SevenDay,
            Utc::now() + Duration::days(7),
            &new_tracking_id(),
        )?;
        db.create_follow_up(
            brief_id,
            FollowUpKind::ThirtyDay,
            Utc::now() + Duration::days(30),
            &new_tracking_id(),
        )?;
    }

    Ok(PersistOutcome {
        brief_id,
        approval_url,
        auto_scheduled,
        schedule_prebuilt,
    })
}

/// Bound a persisted text column without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// 256-bit capability token, hex-encoded.
fn new_approval_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn new_tracking_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
