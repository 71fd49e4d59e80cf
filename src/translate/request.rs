use crate::protocol::gemini::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, PERMISSIVE_SAFETY_SETTINGS,
};
use crate::protocol::openai::{
    ChatCompletionRequest, ChatMessage, ContentItem, MessageContent, StopSequences,
};

/// Encode an OpenAI chat-completion request into a Gemini generateContent
/// request.
///
/// System messages are lifted into `systemInstruction`; unsupported content
/// items degrade best-effort (logged, skipped) rather than failing the whole
/// translation.
#[must_use]
pub fn encode_gemini_request(request: &ChatCompletionRequest) -> GeminiRequest {
    let mut contents = Vec::with_capacity(request.messages.len());
    let mut system_messages: Vec<&str> = Vec::new();

    for message in &request.messages {
        if message.role == "system" {
            // Only plain string system prompts feed systemInstruction.
            if let Some(MessageContent::Text(text)) = &message.content {
                system_messages.push(text);
            }
            continue;
        }

        let parts = encode_message_parts(message);
        if parts.is_empty() {
            continue;
        }

        let role = if message.role == "assistant" {
            "model"
        } else {
            "user"
        };
        contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts,
        });
    }

    let system_instruction = if system_messages.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text(system_messages.join("\n\n"))],
        })
    };

    let generation_config = encode_generation_config(request);

    GeminiRequest {
        contents,
        system_instruction,
        generation_config,
        safety_settings: PERMISSIVE_SAFETY_SETTINGS,
    }
}

fn encode_message_parts(message: &ChatMessage) -> Vec<GeminiPart> {
    match &message.content {
        Some(MessageContent::Text(text)) => vec![GeminiPart::Text(text.clone())],
        Some(MessageContent::Parts(items)) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    ContentItem::Text { text } => {
                        parts.push(GeminiPart::Text(text.clone()));
                    }
                    ContentItem::ImageUrl { image_url } => {
                        if let Some(part) = encode_image_part(&image_url.url) {
                            parts.push(part);
                        }
                    }
                    ContentItem::Unknown => {}
                }
            }
            parts
        }
        None => Vec::new(),
    }
}

fn encode_image_part(url: &str) -> Option<GeminiPart> {
    if !url.starts_with("data:") {
        tracing::warn!(url, "external image URLs are not supported, dropping part");
        return None;
    }

    match parse_data_url(url) {
        Some((mime_type, data)) => Some(GeminiPart::InlineData { mime_type, data }),
        None => {
            tracing::error!("failed to parse image data URL, dropping part");
            None
        }
    }
}

/// Parse `data:<mime>[;params];base64,<payload>` into `(mime, payload)`.
///
/// Returns `None` when the comma or the mime separator is missing.
fn parse_data_url(url: &str) -> Option<(String, String)> {
    let (header, payload) = url.split_once(',')?;
    let (_, mime_and_params) = header.split_once(':')?;
    let mime_type = mime_and_params.split(';').next().unwrap_or_default();
    Some((mime_type.to_string(), payload.to_string()))
}

fn encode_generation_config(request: &ChatCompletionRequest) -> Option<GeminiGenerationConfig> {
    let config = GeminiGenerationConfig {
        temperature: request.temperature,
        max_output_tokens: request.max_tokens,
        top_p: request.top_p,
        stop_sequences: request.stop.as_ref().map(StopSequences::to_vec),
    };

    if config.is_empty() {
        None
    } else {
        Some(config)
    }
}
