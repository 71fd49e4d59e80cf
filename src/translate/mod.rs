pub mod request;
pub mod response;

pub use request::encode_gemini_request;
pub use response::decode_gemini_response;

/// Render an inline-data part as the Markdown image fallback used on both the
/// streaming and non-streaming paths. Generated media is lossily flattened
/// into the text channel.
#[must_use]
pub fn inline_data_markdown(mime_type: &str, data: &str) -> String {
    let mut out = String::with_capacity(32 + mime_type.len() + data.len());
    push_inline_data_markdown(&mut out, mime_type, data);
    out
}

/// Append the Markdown image fallback onto an existing text fragment.
pub(crate) fn push_inline_data_markdown(out: &mut String, mime_type: &str, data: &str) {
    out.push_str("\n![Generated Image](data:");
    out.push_str(mime_type);
    out.push_str(";base64,");
    out.push_str(data);
    out.push_str(")\n");
}
