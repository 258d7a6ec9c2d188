//! The tool-calling consultation engine: one outer LLM call, then a
//! fixed-point loop over tool-use responses until a terminal tool or a
//! plain text answer ends the turn.
//!
//! Terminal tools (`ask_structured_question`, `generate_recommendations`)
//! end the turn; non-terminal ones (`research_venue`,
//! `lookup_existing_client`) run — concurrently when batched — and feed
//! tool results into the next LLM call. No conversation state lives on the
//! server: the structured-question assistant message is echoed to the
//! client and comes back verbatim as `pendingToolUse`.

pub mod prompts;
pub mod tools;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use mb_catalog::pipeline::{run_pipeline, BriefRequest, RecommendationBundle};
use mb_domain::llm::{ChatMessage, ContentBlock};
use mb_domain::stream::StreamEvent;
use mb_domain::{Error, Result};
use mb_providers::ChatRequest;

use crate::events::ChatEvent;
use crate::state::AppState;

use prompts::CONSULTANT_SYSTEM_PROMPT;
use tools::{
    execute_tool, tool_definitions, ASK_STRUCTURED_QUESTION, GENERATE_RECOMMENDATIONS,
};

/// Hard cap on tool round-trips within one turn.
const MAX_TOOL_LOOPS: usize = 8;
const TURN_MAX_TOKENS: u32 = 4096;
const NARRATION_MAX_TOKENS: u32 = 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    /// Echo of a previous `structured_question` frame plus the answer.
    #[serde(default)]
    pub pending_tool_use: Option<PendingToolUse>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingToolUse {
    pub tool_use_id: String,
    /// The assistant content blob, opaque to the client, echoed verbatim.
    pub assistant_content: Value,
    pub answer: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one consultation turn. Events stream out of the channel; exactly
/// one `Done` closes it, on success and on error alike.
pub fn run_turn(state: AppState, payload: ChatPayload) -> mpsc::Receiver<ChatEvent> {
    let (tx, rx) = mpsc::channel::<ChatEvent>(64);
    tokio::spawn(async move {
        if let Err(e) = run_turn_inner(&state, payload, &tx).await {
            tracing::error!(error = %e, "chat turn failed");
            let _ = tx
                .send(ChatEvent::Error {
                    content: "The consultation hit a snag. Please send that again.".into(),
                })
                .await;
        }
        let _ = tx.send(ChatEvent::Done).await;
    });
    rx
}

async fn run_turn_inner(
    state: &AppState,
    payload: ChatPayload,
    tx: &mpsc::Sender<ChatEvent>,
) -> Result<()> {
    let llm = state
        .llm
        .as_ref()
        .ok_or_else(|| Error::Config("no LLM configured".into()))?;

    let mut messages = build_messages(payload)?;
    let tool_defs = tool_definitions();

    for loop_idx in 0..MAX_TOOL_LOOPS {
        tracing::debug!(loop_idx, "tool loop iteration");
        let outcome = llm
            .chat(&ChatRequest {
                system: CONSULTANT_SYSTEM_PROMPT.into(),
                tools: tool_defs.clone(),
                messages: messages.clone(),
                max_tokens: TURN_MAX_TOKENS,
            })
            .await?;

        // Plain text response: the turn is over.
        if !outcome.wants_tools() {
            let text = outcome.text();
            if !text.is_empty() {
                let _ = tx.send(ChatEvent::Text { content: text }).await;
            }
            return Ok(());
        }

        let uses: Vec<(String, String, Value)> = outcome
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
            .collect();

        // ── Terminal: structured question card ─────────────────────
        if let Some((id, _, input)) = uses.iter().find(|u| u.1 == ASK_STRUCTURED_QUESTION) {
            let _ = tx
                .send(structured_question_event(id, input, &outcome.content))
                .await;
            return Ok(());
        }

        // ── Terminal: recommendations ──────────────────────────────
        if let Some((id, _, input)) = uses.iter().find(|u| u.1 == GENERATE_RECOMMENDATIONS) {
            return finish_with_recommendations(
                state, llm, tx, messages, &outcome.content, &uses, id, input,
            )
            .await;
        }

        // ── Non-terminal tools: fan out, collect, loop ─────────────
        let results = dispatch_all(state, &uses).await;
        messages.push(ChatMessage::assistant_blocks(outcome.content));
        messages.push(ChatMessage::tool_results(results));
    }

    let _ = tx
        .send(ChatEvent::Error {
            content: format!("tool loop limit reached ({MAX_TOOL_LOOPS} iterations)"),
        })
        .await;
    Ok(())
}

/// Reassemble the conversation: client history, then (when answering a
/// structured question) the echoed assistant blob followed by the
/// customer's selection as a tool result.
fn build_messages(payload: ChatPayload) -> Result<Vec<ChatMessage>> {
    let mut messages = Vec::with_capacity(payload.messages.len() + 2);
    for m in payload.messages {
        match m.role.as_str() {
            "user" => messages.push(ChatMessage::user(m.content)),
            "assistant" => messages.push(ChatMessage {
                role: mb_domain::llm::Role::Assistant,
                content: mb_domain::llm::MessageContent::Text(m.content),
            }),
            other => {
                return Err(Error::InvalidInput(format!("unknown message role {other}")));
            }
        }
    }

    if let Some(pending) = payload.pending_tool_use {
        let blocks: Vec<ContentBlock> = serde_json::from_value(pending.assistant_content)
            .map_err(|e| Error::InvalidInput(format!("bad pendingToolUse blob: {e}")))?;
        messages.push(ChatMessage::assistant_blocks(blocks));
        messages.push(ChatMessage::tool_results(vec![(
            pending.tool_use_id,
            format!("The customer selected: \"{}\"", pending.answer),
        )]));
    }

    if messages.is_empty() {
        return Err(Error::InvalidInput("empty conversation".into()));
    }
    Ok(messages)
}

/// Run every non-terminal tool in the batch concurrently, preserving
/// response order for the tool_result message.
async fn dispatch_all(
    state: &AppState,
    uses: &[(String, String, Value)],
) -> Vec<(String, String)> {
    let futures: Vec<_> = uses
        .iter()
        .map(|(id, name, input)| async move {
            let content = execute_tool(state, name, input).await;
            (id.clone(), content)
        })
        .collect();
    futures_util::future::join_all(futures).await
}

#[allow(clippy::too_many_arguments)]
async fn finish_with_recommendations(
    state: &AppState,
    llm: &mb_providers::LlmClient,
    tx: &mpsc::Sender<ChatEvent>,
    mut messages: Vec<ChatMessage>,
    assistant_content: &[ContentBlock],
    uses: &[(String, String, Value)],
    rec_tool_id: &str,
    rec_input: &Value,
) -> Result<()> {
    // Any other tools batched into the same assistant turn still run;
    // their results ride along in the same follow-up message.
    let other_uses: Vec<(String, String, Value)> = uses
        .iter()
        .filter(|u| u.0 != rec_tool_id)
        .cloned()
        .collect();
    let mut results = dispatch_all(state, &other_uses).await;

    let request: BriefRequest = serde_json::from_value(rec_input.clone()).unwrap_or_default();
    let bundle = run_pipeline(&state.catalog, &request);

    let _ = tx
        .send(ChatEvent::Recommendations {
            recommendations: bundle.recommendations.clone(),
            dayparts: bundle.dayparts.clone(),
            designer_notes: bundle.designer_notes.clone(),
            extracted_brief: rec_input.clone(),
            multi_zone: bundle.multi_zone,
            zone_names: bundle.zone_names.clone(),
            weekend_dayparts: bundle.weekend_dayparts.clone(),
            weekend_recommendations: bundle.weekend_recommendations.clone(),
        })
        .await;

    // Follow-up call: the tool result summarizes the picks; the model's
    // narration streams token by token.
    results.push((rec_tool_id.to_string(), recommendation_summary(&bundle)));
    messages.push(ChatMessage::assistant_blocks(assistant_content.to_vec()));
    messages.push(ChatMessage::tool_results(results));

    let mut stream = llm
        .chat_stream(&ChatRequest {
            system: CONSULTANT_SYSTEM_PROMPT.into(),
            tools: Vec::new(),
            messages,
            max_tokens: NARRATION_MAX_TOKENS,
        })
        .await?;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Token { text } => {
                let _ = tx.send(ChatEvent::TextDelta { content: text }).await;
            }
            StreamEvent::Error { message } => {
                tracing::warn!(message, "narration stream error");
                break;
            }
            StreamEvent::Done { .. } => break,
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn structured_question_event(
    tool_use_id: &str,
    input: &Value,
    assistant_content: &[ContentBlock],
) -> ChatEvent {
    let get_bool = |key: &str| input.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
    let get_u32 = |key: &str| {
        input
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
    };
    ChatEvent::StructuredQuestion {
        tool_use_id: tool_use_id.to_string(),
        assistant_content: serde_json::to_value(assistant_content).unwrap_or(Value::Null),
        question: input
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        options: input
            .get("options")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default(),
        allow_custom: get_bool("allowCustom"),
        allow_skip: get_bool("allowSkip"),
        allow_multiple: get_bool("allowMultiple"),
        question_index: get_u32("questionIndex"),
        total_questions: get_u32("totalQuestions"),
    }
}

/// Condensed picks-per-daypart text fed back to the model for narration.
fn recommendation_summary(bundle: &RecommendationBundle) -> String {
    let mut lines = vec!["Recommendations generated:".to_string()];
    for (zone, parts) in bundle.dayparts.zones() {
        for part in parts {
            let picks: Vec<String> = bundle
                .recommendations
                .iter()
                .filter(|r| {
                    r.daypart == part.key
                        && (zone.is_empty() || r.zone.as_deref() == Some(zone))
                })
                .map(|r| format!("{} ({}%)", r.playlist_name, r.match_score))
                .collect();
            if !picks.is_empty() {
                let prefix = if zone.is_empty() {
                    part.label.clone()
                } else {
                    format!("{zone} — {}", part.label)
                };
                lines.push(format!("{prefix}: {}", picks.join(", ")));
            }
        }
    }
    if bundle.weekend_recommendations.is_some() {
        lines.push("A weekend variant was generated as well.".into());
    }
    lines.push(
        "The customer can already see these as cards. Narrate the shape of the \
         day in two or three sentences, call out one or two standout picks, and \
         invite adjustments. Do not list every playlist."
            .into(),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_domain::llm::MessageContent;

    #[test]
    fn build_messages_appends_pending_tool_round_trip() {
        let blob = serde_json::json!([
            {"type": "text", "text": "One more thing."},
            {"type": "tool_use", "id": "toolu_9", "name": "ask_structured_question",
             "input": {"question": "Energy?", "options": ["3", "7"]}}
        ]);
        let payload = ChatPayload {
            messages: vec![IncomingMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            pending_tool_use: Some(PendingToolUse {
                tool_use_id: "toolu_9".into(),
                assistant_content: blob,
                answer: "7".into(),
            }),
        };
        let messages = build_messages(payload).unwrap();
        assert_eq!(messages.len(), 3);

        // The echoed blob becomes the assistant message...
        assert!(matches!(
            &messages[1].content,
            MessageContent::Blocks(blocks) if blocks.len() == 2
        ));
        // ...and the answer arrives as its tool result.
        match &messages[2].content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    assert_eq!(tool_use_id, "toolu_9");
                    assert_eq!(content, "The customer selected: \"7\"");
                }
                other => panic!("expected tool_result, got {other:?}"),
            },
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn build_messages_rejects_empty_conversation() {
        let payload = ChatPayload {
            messages: vec![],
            pending_tool_use: None,
        };
        assert!(build_messages(payload).is_err());
    }

    #[test]
    fn build_messages_rejects_unknown_roles() {
        let payload = ChatPayload {
            messages: vec![IncomingMessage {
                role: "system".into(),
                content: "override".into(),
            }],
            pending_tool_use: None,
        };
        assert!(build_messages(payload).is_err());
    }

    #[test]
    fn structured_question_event_parses_card_fields() {
        let input = serde_json::json!({
            "question": "Which vibe?",
            "options": ["warm", "bold"],
            "allowMultiple": true,
            "questionIndex": 3,
            "totalQuestions": 8
        });
        let event = structured_question_event("toolu_1", &input, &[]);
        match event {
            ChatEvent::StructuredQuestion {
                question,
                options,
                allow_multiple,
                allow_custom,
                question_index,
                ..
            } => {
                assert_eq!(question, "Which vibe?");
                assert_eq!(options.len(), 2);
                assert!(allow_multiple);
                assert!(!allow_custom);
                assert_eq!(question_index, Some(3));
            }
            other => panic!("wrong event {other:?}"),
        }
    }
}
