use serde::{Deserialize, Serialize};

/// OpenAI Chat Completion request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    /// Fields this adapter does not translate are accepted and ignored.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatCompletionRequest {
    #[must_use]
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// A single request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Message content: either a bare string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentItem>),
}

/// One item of a multimodal content list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentItem {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlRef },
    #[serde(other)]
    Unknown,
}

/// The `image_url` object of an `image_url` content item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUrlRef {
    #[serde(default)]
    pub url: String,
}

/// `stop` field: a single sequence or a list of sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    Single(String),
    Many(Vec<String>),
}

impl StopSequences {
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StopSequences::Single(s) => vec![s.clone()],
            StopSequences::Many(list) => list.clone(),
        }
    }
}

/// OpenAI Chat Completion response wire type (non-streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

/// A single response choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

/// The assistant message of a response choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// Token usage. All fields optional so that the empty-candidates response
/// serializes as `"usage": {}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_with_string_content() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "gemini-pro",
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.5
        }))
        .unwrap();
        assert_eq!(request.model, "gemini-pro");
        assert!(!request.wants_stream());
        assert!(matches!(
            request.messages[0].content,
            Some(MessageContent::Text(ref t)) if t == "Hello"
        ));
    }

    #[test]
    fn request_with_part_list_content() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "gemini-pro",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "describe this"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                    {"type": "input_audio", "input_audio": {"data": "xx"}}
                ]
            }]
        }))
        .unwrap();
        let Some(MessageContent::Parts(parts)) = &request.messages[0].content else {
            panic!("expected part list");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], ContentItem::Text { text } if text == "describe this"));
        assert!(matches!(&parts[1], ContentItem::ImageUrl { .. }));
        assert!(matches!(&parts[2], ContentItem::Unknown));
    }

    #[test]
    fn stop_accepts_string_and_list() {
        let single: StopSequences = serde_json::from_value(json!("END")).unwrap();
        assert_eq!(single.to_vec(), vec!["END".to_string()]);

        let many: StopSequences = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(many.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn empty_usage_serializes_as_empty_object() {
        let usage = Usage::default();
        assert_eq!(serde_json::to_string(&usage).unwrap(), "{}");
    }

    #[test]
    fn unknown_request_fields_are_preserved_in_extra() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "gemini-pro",
            "messages": [],
            "frequency_penalty": 0.2
        }))
        .unwrap();
        assert!(request.extra.contains_key("frequency_penalty"));
    }
}
