use super::gemini::GeminiUsageMetadata;
use super::openai::Usage;

/// Map a Gemini finish reason onto the OpenAI `finish_reason` vocabulary.
///
/// Total over the Gemini vocabulary; unknown or future reasons fall back to
/// `"stop"`.
#[must_use]
pub fn gemini_finish_to_openai(reason: &str) -> &'static str {
    match reason {
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" => "content_filter",
        _ => "stop",
    }
}

/// Map Gemini usage metadata onto OpenAI usage fields, defaulting missing
/// counters to zero.
#[must_use]
pub fn gemini_usage_to_openai(usage: &GeminiUsageMetadata) -> Usage {
    Usage {
        prompt_tokens: Some(usage.prompt_token_count.unwrap_or(0)),
        completion_tokens: Some(usage.candidates_token_count.unwrap_or(0)),
        total_tokens: Some(usage.total_token_count.unwrap_or(0)),
    }
}
