//! SSE chat frames. One JSON object per event; the `type` field drives the
//! client. Every stream — success or error — terminates with one `done`.

use serde::Serialize;
use serde_json::Value;

use mb_domain::brief::{Dayparts, Recommendation};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A whole text block (non-streamed narration).
    Text { content: String },

    /// One streamed token.
    TextDelta { content: String },

    /// Terminal card: the client renders the question and must echo
    /// `assistant_content` back verbatim as `pendingToolUse` next turn.
    #[serde(rename_all = "camelCase")]
    StructuredQuestion {
        tool_use_id: String,
        /// The entire assistant message content, opaque to the client.
        assistant_content: Value,
        question: String,
        options: Vec<Value>,
        allow_custom: bool,
        allow_skip: bool,
        allow_multiple: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        question_index: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_questions: Option<u32>,
    },

    /// Terminal card: the full recommendation bundle.
    #[serde(rename_all = "camelCase")]
    Recommendations {
        recommendations: Vec<Recommendation>,
        dayparts: Dayparts,
        designer_notes: String,
        extracted_brief: Value,
        multi_zone: bool,
        zone_names: Vec<String>,
        weekend_dayparts: Option<Dayparts>,
        weekend_recommendations: Option<Vec<Recommendation>>,
    },

    Error { content: String },

    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_snake_case_types_and_camel_case_fields() {
        let event = ChatEvent::StructuredQuestion {
            tool_use_id: "toolu_1".into(),
            assistant_content: serde_json::json!([]),
            question: "What vibe fits?".into(),
            options: vec![serde_json::json!("warm")],
            allow_custom: true,
            allow_skip: false,
            allow_multiple: true,
            question_index: Some(2),
            total_questions: Some(7),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "structured_question");
        assert_eq!(v["toolUseId"], "toolu_1");
        assert_eq!(v["allowMultiple"], true);
        assert_eq!(v["questionIndex"], 2);
    }

    #[test]
    fn done_frame_is_bare() {
        let v = serde_json::to_value(ChatEvent::Done).unwrap();
        assert_eq!(v, serde_json::json!({"type": "done"}));
    }
}
