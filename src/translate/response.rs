use crate::protocol::gemini::{GeminiPart, GeminiResponse};
use crate::protocol::mapping::{gemini_finish_to_openai, gemini_usage_to_openai};
use crate::protocol::openai::{
    AssistantMessage, ChatChoice, ChatCompletionResponse, Usage,
};
use crate::translate::push_inline_data_markdown;
use crate::util::{next_completion_id, unix_now_secs};

/// Decode a complete Gemini generateContent response into an OpenAI chat
/// completion, reported under the model id the caller originally asked for.
///
/// Only the first candidate is translated; alternatives are discarded.
#[must_use]
pub fn decode_gemini_response(response: &GeminiResponse, model: &str) -> ChatCompletionResponse {
    let id = next_completion_id();
    let created = unix_now_secs();

    let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) else {
        // Zero candidates is a valid, empty completion, not an error.
        return ChatCompletionResponse {
            id,
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: Vec::new(),
            usage: Usage::default(),
        };
    };

    let mut content = String::new();
    if let Some(parts) = candidate.content.as_ref().map(|c| &c.parts) {
        for part in parts {
            match part {
                GeminiPart::Text(text) => content.push_str(text),
                GeminiPart::InlineData { mime_type, data } => {
                    push_inline_data_markdown(&mut content, mime_type, data);
                }
            }
        }
    }

    let finish_reason =
        gemini_finish_to_openai(candidate.finish_reason.as_deref().unwrap_or("STOP"));

    let usage = gemini_usage_to_openai(response.usage_metadata.as_ref().unwrap_or(&Default::default()));

    ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: finish_reason.to_string(),
        }],
        usage,
    }
}
