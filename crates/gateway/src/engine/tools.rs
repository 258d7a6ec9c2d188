//! Tool definitions and the server-side executors for the two
//! non-terminal tools. Executors never fail the conversation: every error
//! path returns a benign directive the model can act on.

use serde_json::{json, Value};

use mb_domain::llm::ToolDefinition;
use mb_providers::search::summarize_hits;

use crate::state::AppState;

pub const ASK_STRUCTURED_QUESTION: &str = "ask_structured_question";
pub const RESEARCH_VENUE: &str = "research_venue";
pub const LOOKUP_EXISTING_CLIENT: &str = "lookup_existing_client";
pub const GENERATE_RECOMMENDATIONS: &str = "generate_recommendations";

const MAX_RESEARCH_QUERIES: usize = 4;

/// The four tools exposed to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ASK_STRUCTURED_QUESTION.into(),
            description: "Present the customer with one structured question card. \
                          This ends your turn; the answer arrives as the tool result."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["question", "options"],
                "properties": {
                    "question": { "type": "string" },
                    "options": {
                        "type": "array",
                        "items": { "type": ["string", "object"] }
                    },
                    "allowCustom": { "type": "boolean", "default": false },
                    "allowSkip": { "type": "boolean", "default": false },
                    "allowMultiple": { "type": "boolean", "default": false },
                    "questionIndex": { "type": "integer" },
                    "totalQuestions": { "type": "integer" }
                }
            }),
        },
        ToolDefinition {
            name: RESEARCH_VENUE.into(),
            description: "Run up to four web searches about the venue and return \
                          snippets. Use for grounding the brief in the venue's \
                          actual identity."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["queries"],
                "properties": {
                    "queries": {
                        "type": "array",
                        "items": { "type": "string" },
                        "maxItems": 4
                    }
                }
            }),
        },
        ToolDefinition {
            name: LOOKUP_EXISTING_CLIENT.into(),
            description: "Check whether the venue already has a platform account. \
                          Follow the returned directive exactly."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["venueName"],
                "properties": {
                    "venueName": { "type": "string" },
                    "product": { "type": "string", "enum": ["syb", "beatbreeze"] }
                }
            }),
        },
        ToolDefinition {
            name: GENERATE_RECOMMENDATIONS.into(),
            description: "Generate the playlist schedule from the completed brief. \
                          This ends your turn; summarize the results afterwards."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["venueType", "vibes", "energy", "hours"],
                "properties": {
                    "venueName": { "type": "string" },
                    "venueType": { "type": "string" },
                    "vibes": { "type": "array", "items": { "type": "string" } },
                    "energy": { "type": "integer", "minimum": 1, "maximum": 10 },
                    "hours": { "type": "string" },
                    "vocals": { "type": "string" },
                    "avoidList": { "type": "string" },
                    "genreHints": { "type": "array", "items": { "type": "string" } },
                    "zones": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": { "type": "string" },
                                "hours": { "type": "string" },
                                "energy": { "type": "integer" },
                                "vibes": { "type": "array", "items": { "type": "string" } },
                                "genreHints": { "type": "array", "items": { "type": "string" } }
                            }
                        }
                    },
                    "weekend": {
                        "type": "object",
                        "properties": {
                            "hours": { "type": "string" },
                            "energy": { "type": "integer" },
                            "vibes": { "type": "array", "items": { "type": "string" } },
                            "genreHints": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                }
            }),
        },
    ]
}

/// Execute a non-terminal tool. Unknown names return an error directive
/// instead of failing the turn.
pub async fn execute_tool(state: &AppState, name: &str, input: &Value) -> String {
    match name {
        RESEARCH_VENUE => research_venue(state, input).await,
        LOOKUP_EXISTING_CLIENT => lookup_existing_client(state, input).await,
        other => {
            tracing::warn!(tool = other, "model invoked unknown tool");
            format!("Unknown tool {other}; continue the consultation without it.")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// research_venue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn research_venue(state: &AppState, input: &Value) -> String {
    let Some(search) = &state.search else {
        return "Web research is not available. Continue the consultation without it."
            .to_string();
    };

    let queries: Vec<&str> = input
        .get("queries")
        .and_then(|q| q.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut sections = Vec::new();
    for query in queries.iter().take(MAX_RESEARCH_QUERIES) {
        match search.search(query).await {
            Ok(hits) => sections.push(summarize_hits(query, &hits)),
            Err(e) => {
                tracing::warn!(query, error = %e, "venue research query failed");
            }
        }
    }

    if sections.is_empty() {
        return "Research returned nothing useful. Continue the consultation without it."
            .to_string();
    }

    format!(
        "{}\n\nFrom this research, draw one concise conclusion about the right \
         music direction for the venue. Do not repeat the facts above.",
        sections.join("\n\n")
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// lookup_existing_client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn lookup_existing_client(state: &AppState, input: &Value) -> String {
    let product = input
        .get("product")
        .and_then(|p| p.as_str())
        .unwrap_or("syb");
    if product != "syb" {
        return "This product has no platform accounts. Continue as a new client \
                and do not mention this lookup."
            .to_string();
    }

    let venue_name = input
        .get("venueName")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    if venue_name.is_empty() {
        return "No venue name to look up yet. Continue as a new client silently."
            .to_string();
    }

    let matches = match &state.accounts {
        Some(cache) => match cache.search(venue_name).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(venue_name, error = %e, "account lookup failed");
                return "The account lookup is unavailable. Continue as a new \
                        client and do not mention this lookup."
                    .to_string();
            }
        },
        None => Vec::new(),
    };

    match matches.len() {
        1 => {
            let account = &matches[0];
            let zones = match &state.platform {
                Some(platform) => platform.zones(&account.id).await.unwrap_or_default(),
                None => Vec::new(),
            };
            let zone_list = if zones.is_empty() {
                "(no zones visible)".to_string()
            } else {
                zones
                    .iter()
                    .map(|z| z.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!(
                "EXISTING CLIENT: \"{}\" (accountId {}). Sound zones: {}. \
                 Welcome them back warmly by business name and confirm whether \
                 this brief refreshes an existing zone or adds a new one.",
                account.business_name, account.id, zone_list
            )
        }
        2..=5 => {
            let mapping = matches
                .iter()
                .map(|a| format!("{} => {}", a.business_name, a.id))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "ACCOUNT ID MAPPING:\n{mapping}\n\nSeveral accounts match. Present \
                 a structured question listing these business names so the \
                 customer can pick theirs, then echo the chosen accountId."
            )
        }
        n if n > 5 => "Too many accounts match that name. Ask the customer to copy \
                       the exact business name as registered on their account."
            .to_string(),
        _ => {
            // Nothing on the platform; fall back to our own venue history.
            if let Some(db) = &state.db {
                if let Ok(Some(venue)) = db.get_venue(venue_name) {
                    return format!(
                        "RETURNING VENUE: \"{}\" has briefed with us before \
                         (approved briefs: {}). Welcome them back and ask what \
                         has changed since last time.",
                        venue.venue_name, venue.approved_brief_count
                    );
                }
            }
            "No existing account found. This is a new client; continue the \
             consultation silently without mentioning this lookup."
                .to_string()
        }
    }
}
