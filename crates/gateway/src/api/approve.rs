//! `GET/POST /approve/:token` — the human approval step. The GET renders
//! per-zone drop-downs joining the platform's sound zones with previously
//! learned mappings; the POST persists the mapping, materializes schedule
//! entries (or binds the pre-built remote schedule), and consumes the
//! token — all inside one store transaction.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use chrono::Utc;

use mb_providers::PlatformZone;
use mb_store::{ApprovalFinalization, ApprovalTokenRow, BriefRow, ZoneMappingRow};

use crate::schedule_build::{entries_from_schedule_data, DEFAULT_ZONE};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTML helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: String) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         <title>{title}</title></head>\
         <body style=\"font-family:Arial,Helvetica,sans-serif;color:#1d2733;\
         max-width:560px;margin:0 auto;padding:32px 16px\">\
         <h1 style=\"color:#0d5c63;font-size:22px\">{title}</h1>{body}</body></html>",
        title = escape(title),
    )
}

fn message_page(status: StatusCode, title: &str, message: &str) -> Response {
    (
        status,
        Html(page(title, format!("<p>{}</p>", escape(message)))),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum TokenCheck {
    Valid(ApprovalTokenRow, BriefRow),
    Rejected(Response),
}

fn check_token(state: &AppState, token: &str) -> TokenCheck {
    let Some(db) = &state.db else {
        return TokenCheck::Rejected(message_page(
            StatusCode::SERVICE_UNAVAILABLE,
            "Approval unavailable",
            "The approval service is not connected to its database.",
        ));
    };

    let row = match db.get_token(token) {
        Ok(Some(row)) => row,
        Ok(None) => {
            return TokenCheck::Rejected(message_page(
                StatusCode::NOT_FOUND,
                "Link not recognized",
                "This approval link is not valid. Check that the full link was copied.",
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "token lookup failed");
            return TokenCheck::Rejected(message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "Please reopen the link in a moment.",
            ));
        }
    };

    if row.used_at.is_some() {
        return TokenCheck::Rejected(message_page(
            StatusCode::GONE,
            "Already approved",
            "This schedule has already been activated. Nothing more to do.",
        ));
    }
    if row.expires_at < Utc::now() {
        return TokenCheck::Rejected(message_page(
            StatusCode::GONE,
            "Link expired",
            "This approval link has expired. Ask the team to resend the brief.",
        ));
    }

    let brief = match db.get_brief(row.brief_id) {
        Ok(Some(brief)) => brief,
        _ => {
            return TokenCheck::Rejected(message_page(
                StatusCode::NOT_FOUND,
                "Brief not found",
                "The brief behind this link no longer exists.",
            ))
        }
    };

    TokenCheck::Valid(row, brief)
}

/// Discover the platform zones for pre-filling the drop-downs: the
/// confirmed account first, otherwise a unique cache match on the venue
/// name. Empty on any miss — the form degrades to free-text inputs.
async fn discover_zones(state: &AppState, brief: &BriefRow) -> Vec<PlatformZone> {
    let Some(platform) = &state.platform else {
        return Vec::new();
    };

    let mut account_id = brief.syb_account_id.clone();
    if account_id.is_none() {
        if let Some(db) = &state.db {
            if let Ok(Some(venue)) = db.get_venue(&brief.venue_name) {
                account_id = venue.syb_account_id;
            }
        }
    }
    if account_id.is_none() {
        if let Some(cache) = &state.accounts {
            if let Ok(matches) = cache.search(&brief.venue_name).await {
                if matches.len() == 1 {
                    account_id = Some(matches[0].id.clone());
                }
            }
        }
    }

    match account_id {
        Some(id) => platform.zones(&id).await.unwrap_or_default(),
        None => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn approve_page(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let (_, brief) = match check_token(&state, &token) {
        TokenCheck::Valid(row, brief) => (row, brief),
        TokenCheck::Rejected(resp) => return resp,
    };

    let Some(schedule_data) = &brief.schedule_data else {
        return message_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Nothing to approve",
            "This brief has no schedule attached.",
        );
    };

    let zones = discover_zones(&state, &brief).await;
    let saved: Vec<ZoneMappingRow> = state
        .db
        .as_ref()
        .and_then(|db| db.zone_mappings(&brief.venue_name).ok())
        .unwrap_or_default();

    let zone_names = if schedule_data.zone_names.is_empty() {
        vec![DEFAULT_ZONE.to_string()]
    } else {
        schedule_data.zone_names.clone()
    };

    let mut rows = String::new();
    for zone_name in &zone_names {
        let preselect = saved
            .iter()
            .find(|m| m.brief_zone_name.eq_ignore_ascii_case(zone_name))
            .map(|m| m.syb_zone_id.clone());

        let field = if zones.is_empty() {
            // No platform visibility; accept a raw zone id.
            let value = preselect.map(|id| format!("{id}|{zone_name}")).unwrap_or_default();
            format!(
                "<input type=\"text\" name=\"zone_{name}\" value=\"{value}\" \
                 placeholder=\"platform zone id\" style=\"width:100%;padding:8px\"/>",
                name = escape(zone_name),
                value = escape(&value),
            )
        } else {
            let mut options = String::from("<option value=\"\">— choose a zone —</option>");
            for z in &zones {
                let selected = if preselect.as_deref() == Some(z.id.as_str()) {
                    " selected"
                } else {
                    ""
                };
                options.push_str(&format!(
                    "<option value=\"{id}|{zname}\"{selected}>{zname}{loc}</option>",
                    id = escape(&z.id),
                    zname = escape(&z.name),
                    loc = z
                        .location
                        .as_deref()
                        .map(|l| format!(" ({})", escape(l)))
                        .unwrap_or_default(),
                ));
            }
            format!(
                "<select name=\"zone_{name}\" style=\"width:100%;padding:8px\">{options}</select>",
                name = escape(zone_name),
            )
        };

        rows.push_str(&format!(
            "<div style=\"margin:16px 0\"><label><strong>{}</strong></label><br/>{field}</div>",
            escape(zone_name),
        ));
    }

    let prebuilt_note = if brief.syb_schedule_id.is_some() {
        "<p style=\"background:#e7f6ee;padding:8px 12px;border-radius:6px\">\
         A schedule is already built on the platform; approving binds it to \
         the selected zones.</p>"
    } else {
        ""
    };

    let body = format!(
        "<p>Match each area of <strong>{venue}</strong> to its player zone, \
         then activate the schedule.</p>{prebuilt_note}\
         <form method=\"post\">{rows}\
         <button type=\"submit\" style=\"background:#0d5c63;color:#fff;\
         padding:12px 24px;border:none;border-radius:6px;font-size:16px\">\
         Activate schedule</button></form>",
        venue = escape(&brief.venue_name),
    );

    Html(page("Activate your music schedule", body)).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn approve_submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let (token_row, brief) = match check_token(&state, &token) {
        TokenCheck::Valid(row, brief) => (row, brief),
        TokenCheck::Rejected(resp) => return resp,
    };
    // check_token guarantees the db exists past this point.
    let Some(db) = state.db.clone() else {
        return message_page(
            StatusCode::SERVICE_UNAVAILABLE,
            "Approval unavailable",
            "The approval service is not connected to its database.",
        );
    };

    let Some(schedule_data) = &brief.schedule_data else {
        return message_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Nothing to approve",
            "This brief has no schedule attached.",
        );
    };

    let mappings = parse_zone_fields(&fields);
    if mappings.is_empty() {
        return message_page(
            StatusCode::BAD_REQUEST,
            "No zones selected",
            "Pick a player zone for at least one area, then try again.",
        );
    }

    let venue = db.get_venue(&brief.venue_name).ok().flatten();
    let timezone = venue
        .as_ref()
        .map(|v| v.timezone.clone())
        .unwrap_or_else(|| "Asia/Bangkok".to_string());
    let account_id = brief
        .syb_account_id
        .clone()
        .or_else(|| venue.as_ref().and_then(|v| v.syb_account_id.clone()));

    // Pre-built remote schedule: bind it to the mapped zones before any
    // state changes, so a platform failure leaves the token redeemable.
    let remote_schedule_id = brief.syb_schedule_id.clone();
    if let Some(schedule_id) = &remote_schedule_id {
        let Some(platform) = &state.platform else {
            return message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed",
                "The music platform is unreachable. Reopen the link to retry.",
            );
        };
        let zone_ids: Vec<String> = mappings.iter().map(|(_, id, _)| id.clone()).collect();
        if let Err(e) = platform.assign_source(&zone_ids, schedule_id).await {
            tracing::error!(error = %e, "remote schedule bind failed");
            return message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed",
                "The platform rejected the assignment. Reopen the link to retry.",
            );
        }
    }

    let entries = if remote_schedule_id.is_some() {
        Vec::new()
    } else {
        let mapping_rows: Vec<ZoneMappingRow> = mappings
            .iter()
            .map(|(zone, id, name)| ZoneMappingRow {
                id: 0,
                venue_name: brief.venue_name.clone(),
                brief_zone_name: zone.clone(),
                syb_zone_id: id.clone(),
                syb_zone_name: name.clone(),
                syb_account_id: account_id.clone(),
            })
            .collect();
        entries_from_schedule_data(schedule_data, &mapping_rows, &timezone)
    };

    let finalized = db.finalize_approval(&ApprovalFinalization {
        token_id: token_row.id,
        brief_id: brief.id,
        venue_name: &brief.venue_name,
        mappings: &mappings,
        syb_account_id: account_id.as_deref(),
        entries: &entries,
        remote_schedule_id: remote_schedule_id.as_deref(),
    });

    match finalized {
        Ok(true) => {
            tracing::info!(
                brief_id = brief.id,
                entries = entries.len(),
                remote = remote_schedule_id.is_some(),
                "schedule approved"
            );
            message_page(
                StatusCode::OK,
                "Schedule activated",
                "The music schedule is live. The player will follow it from the next time block.",
            )
        }
        Ok(false) => message_page(
            StatusCode::GONE,
            "Already approved",
            "This schedule has already been activated. Nothing more to do.",
        ),
        Err(e) => {
            tracing::error!(error = %e, "approval finalization failed");
            message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed",
                "The approval could not be saved. Reopen the link to retry.",
            )
        }
    }
}

/// Parse `zone_<briefZoneName>` form fields into
/// `(brief_zone_name, syb_zone_id, syb_zone_name)` triples. Values carry
/// `id|name`; a bare id falls back to the brief zone name for display.
fn parse_zone_fields(fields: &HashMap<String, String>) -> Vec<(String, String, String)> {
    let mut mappings: Vec<(String, String, String)> = fields
        .iter()
        .filter_map(|(key, value)| {
            let zone = key.strip_prefix("zone_")?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            let (id, name) = match value.split_once('|') {
                Some((id, name)) => (id.trim(), name.trim()),
                None => (value, zone),
            };
            (!id.is_empty()).then(|| (zone.to_string(), id.to_string(), name.to_string()))
        })
        .collect();
    mappings.sort();
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_fields_parse_id_and_name() {
        let mut fields = HashMap::new();
        fields.insert("zone_Lobby".to_string(), "z1|Lobby Floor".to_string());
        fields.insert("zone_Pool".to_string(), "z2".to_string());
        fields.insert("zone_Bar".to_string(), "".to_string());
        fields.insert("unrelated".to_string(), "x".to_string());

        let mappings = parse_zone_fields(&fields);
        assert_eq!(
            mappings,
            vec![
                ("Lobby".to_string(), "z1".to_string(), "Lobby Floor".to_string()),
                ("Pool".to_string(), "z2".to_string(), "Pool".to_string()),
            ]
        );
    }

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("<b>&\"</b>"), "&lt;b&gt;&amp;&quot;&lt;/b&gt;");
    }
}
