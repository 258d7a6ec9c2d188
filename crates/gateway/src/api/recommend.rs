//! `POST /api/recommend` — the non-chat recommendation path. Optionally
//! lets the LLM curate first against a strict JSON envelope; any parse or
//! validation problem falls back to the deterministic matcher, as does a
//! missing LLM entirely.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use mb_catalog::dayparts::generate_dayparts;
use mb_catalog::designer::build_designer_brief;
use mb_catalog::pipeline::{run_pipeline, BriefRequest, RecommendationBundle};
use mb_domain::brief::{Dayparts, Recommendation};
use mb_providers::{ChatRequest, LlmClient};

use super::api_error;
use crate::state::AppState;

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<BriefRequest>,
) -> Response {
    let has_vibes =
        !request.vibes.is_empty() || request.zones.iter().any(|z| z.vibes.is_some());
    if !has_vibes {
        return api_error(StatusCode::BAD_REQUEST, "at least one vibe is required");
    }

    // LLM-first curation, single-zone only; anything short of a fully
    // valid envelope falls through to the deterministic matcher.
    if request.zones.len() <= 1 {
        if let Some(llm) = &state.llm {
            match llm_curated_bundle(&state, llm, &request).await {
                Some(bundle) => return Json(bundle).into_response(),
                None => {
                    tracing::info!("LLM curation unusable; using deterministic matcher")
                }
            }
        }
    }

    Json(run_pipeline(&state.catalog, &request)).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmEnvelope {
    recommendations: Vec<LlmPick>,
    #[serde(default)]
    designer_notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmPick {
    playlist_id: String,
    daypart: String,
    reason: String,
    match_score: f64,
}

async fn llm_curated_bundle(
    state: &AppState,
    llm: &LlmClient,
    request: &BriefRequest,
) -> Option<RecommendationBundle> {
    let dayparts = generate_dayparts(&request.hours, request.energy);

    let catalog_digest: Vec<String> = state
        .catalog
        .iter()
        .map(|p| {
            format!(
                "{} | {} | {} | categories: {}",
                p.id,
                p.name,
                p.description,
                p.categories.iter().cloned().collect::<Vec<_>>().join(",")
            )
        })
        .collect();
    let daypart_digest: Vec<String> = dayparts
        .iter()
        .map(|d| format!("{} ({}, energy {})", d.key, d.time_range, d.energy))
        .collect();

    let prompt = format!(
        "Select playlists for this venue from the catalog below.\n\n\
         Brief: {brief}\n\nDayparts:\n{parts}\n\nCatalog:\n{catalog}\n\n\
         Respond with ONLY a JSON object, no prose and no code fences:\n\
         {{\"recommendations\":[{{\"playlistId\":\"...\",\"daypart\":\"...\",\
         \"reason\":\"...\",\"matchScore\":55}}],\"designerNotes\":\"...\"}}\n\
         Use only playlist ids and daypart keys that appear above. matchScore \
         is an integer from 55 to 95.",
        brief = serde_json::to_string(request).ok()?,
        parts = daypart_digest.join("\n"),
        catalog = catalog_digest.join("\n"),
    );

    let outcome = llm
        .chat(&ChatRequest {
            system: String::new(),
            tools: Vec::new(),
            messages: vec![mb_domain::llm::ChatMessage::user(prompt)],
            max_tokens: 2048,
        })
        .await
        .map_err(|e| tracing::warn!(error = %e, "LLM curation call failed"))
        .ok()?;

    let envelope: LlmEnvelope = serde_json::from_str(&extract_json_object(&outcome.text())?)
        .map_err(|e| tracing::debug!(error = %e, "LLM envelope did not parse"))
        .ok()?;

    build_bundle_from_envelope(state, request, dayparts, envelope)
}

/// Pull the outermost JSON object out of model text, tolerating code
/// fences and stray prose around it.
fn extract_json_object(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let defenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```"))
        .unwrap_or(trimmed);
    let start = defenced.find('{')?;
    let end = defenced.rfind('}')?;
    (end > start).then(|| defenced[start..=end].to_string())
}

/// Validate every pick against the catalog and the daypart keys; a single
/// bad pick rejects the whole envelope.
fn build_bundle_from_envelope(
    state: &AppState,
    request: &BriefRequest,
    dayparts: Vec<mb_domain::brief::Daypart>,
    envelope: LlmEnvelope,
) -> Option<RecommendationBundle> {
    if envelope.recommendations.is_empty() {
        return None;
    }

    let mut recommendations = Vec::with_capacity(envelope.recommendations.len());
    for pick in envelope.recommendations {
        let playlist = state.catalog.resolve(&pick.playlist_id)?;
        if !dayparts.iter().any(|d| d.key == pick.daypart) {
            return None;
        }
        recommendations.push(Recommendation {
            playlist_id: playlist.id.clone(),
            playlist_name: playlist.name.clone(),
            playlist_syb_id: playlist.syb_id.clone(),
            daypart: pick.daypart,
            zone: None,
            schedule_type: "weekday".into(),
            reason: pick.reason,
            match_score: pick.match_score.round().clamp(55.0, 95.0) as u8,
        });
    }

    let designer_brief =
        build_designer_brief(&request.vibes, &request.venue_type, request.energy, &dayparts);
    Some(RecommendationBundle {
        recommendations,
        dayparts: Dayparts::Single(dayparts),
        designer_notes: envelope.designer_notes,
        multi_zone: false,
        zone_names: request.zones.iter().map(|z| z.name.clone()).collect(),
        weekend_dayparts: None,
        weekend_recommendations: None,
        designer_brief,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_fences_and_prose() {
        let fenced = "```json\n{\"recommendations\":[]}\n```";
        assert_eq!(
            extract_json_object(fenced).unwrap(),
            "{\"recommendations\":[]}"
        );

        let prosey = "Here you go:\n{\"a\": 1}\nHope that helps!";
        assert_eq!(extract_json_object(prosey).unwrap(), "{\"a\": 1}");

        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn envelope_requires_known_playlists_and_dayparts() {
        let envelope: LlmEnvelope = serde_json::from_str(
            r#"{"recommendations":[{"playlistId":"ghost","daypart":"opening",
                "reason":"","matchScore":80}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.recommendations.len(), 1);
        // Full validation runs through build_bundle_from_envelope, which
        // needs state; the parse layer itself is covered here.
        assert_eq!(envelope.recommendations[0].playlist_id, "ghost");
    }
}
