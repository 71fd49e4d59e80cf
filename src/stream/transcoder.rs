use bytes::Bytes;
use futures_util::Stream;
use smallvec::SmallVec;

use super::{LineBuffer, DONE_FRAME};
use crate::protocol::gemini::{GeminiPart, GeminiResponse, GeminiUsageMetadata};
use crate::protocol::mapping::gemini_finish_to_openai;
use crate::translate::inline_data_markdown;
use crate::util::{next_completion_id, push_json_string_escaped, push_u64_decimal, unix_now_secs};

const DONE_LINE: &[u8] = b"data: [DONE]";
const DATA_PREFIX: &[u8] = b"data: ";

/// Live Gemini-to-OpenAI stream transcoder.
///
/// Consumes the raw SSE byte stream of a `streamGenerateContent` call in
/// arbitrary chunk sizes and emits OpenAI `chat.completion.chunk` frames as
/// soon as they can be produced. Every frame of one call carries the same
/// completion id, model, and `created` timestamp; [`StreamTranscoder::finish`]
/// emits the single `data: [DONE]` terminator.
#[derive(Debug)]
pub struct StreamTranscoder {
    lines: LineBuffer,
    completion_id: String,
    model: String,
    created: u64,
    done_emitted: bool,
}

impl StreamTranscoder {
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self::with_created(next_completion_id(), model.to_string(), unix_now_secs())
    }

    /// Construct with an explicit completion id and timestamp, for callers
    /// that need deterministic frame bytes.
    #[must_use]
    pub fn with_created(completion_id: String, model: String, created: u64) -> Self {
        Self {
            lines: LineBuffer::new(),
            completion_id,
            model,
            created,
            done_emitted: false,
        }
    }

    /// Feed one chunk of provider bytes and append any completed OpenAI
    /// frames to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<Bytes>) {
        self.lines.feed(chunk);
        while let Some(line) = self.lines.next_line() {
            self.transcode_line(&line, out);
        }
    }

    /// Terminate the stream: drop any partial tail and emit the `[DONE]`
    /// marker, exactly once no matter how often this is called.
    pub fn finish(&mut self, out: &mut Vec<Bytes>) {
        self.lines.clear();
        if !self.done_emitted {
            self.done_emitted = true;
            out.push(Bytes::from_static(DONE_FRAME));
        }
    }

    fn transcode_line(&self, line: &[u8], out: &mut Vec<Bytes>) {
        let line = line.trim_ascii();
        if line.is_empty() || line == DONE_LINE {
            return;
        }
        // Anything without the data prefix is a comment or keep-alive line.
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        let chunk: GeminiResponse = match serde_json::from_slice(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                // One malformed frame must not kill a healthy stream.
                tracing::error!(error = %err, "failed to parse Gemini SSE chunk");
                return;
            }
        };

        let Some(candidate) = chunk.candidates.as_ref().and_then(|c| c.first()) else {
            return;
        };

        if let Some(content) = &candidate.content {
            for part in &content.parts {
                match part {
                    GeminiPart::Text(text) => {
                        if !text.is_empty() {
                            out.push(self.text_delta_frame(text));
                        }
                    }
                    GeminiPart::InlineData { mime_type, data } => {
                        out.push(self.text_delta_frame(&inline_data_markdown(mime_type, data)));
                    }
                }
            }
        }

        if let Some(reason) = candidate.finish_reason.as_deref() {
            out.push(self.finish_frame(
                gemini_finish_to_openai(reason),
                chunk.usage_metadata.as_ref(),
            ));
        }
    }

    fn push_frame_prefix(&self, out: &mut String) {
        out.push_str("data: {\"id\":");
        push_json_string_escaped(out, &self.completion_id);
        out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
        push_u64_decimal(out, self.created);
        out.push_str(",\"model\":");
        push_json_string_escaped(out, &self.model);
    }

    fn text_delta_frame(&self, text: &str) -> Bytes {
        let mut out =
            String::with_capacity(128 + self.completion_id.len() + self.model.len() + text.len());
        self.push_frame_prefix(&mut out);
        out.push_str(",\"choices\":[{\"index\":0,\"delta\":{\"content\":");
        push_json_string_escaped(&mut out, text);
        out.push_str("},\"finish_reason\":null}]}\n\n");
        Bytes::from(out)
    }

    fn finish_frame(&self, finish_reason: &str, usage: Option<&GeminiUsageMetadata>) -> Bytes {
        let mut out = String::with_capacity(160 + self.completion_id.len() + self.model.len());
        self.push_frame_prefix(&mut out);
        out.push_str(",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":");
        push_json_string_escaped(&mut out, finish_reason);
        out.push_str("}]");
        if let Some(usage) = usage {
            out.push_str(",\"usage\":{\"prompt_tokens\":");
            push_u64_decimal(&mut out, usage.prompt_token_count.unwrap_or(0));
            out.push_str(",\"completion_tokens\":");
            push_u64_decimal(&mut out, usage.candidates_token_count.unwrap_or(0));
            out.push_str(",\"total_tokens\":");
            push_u64_decimal(&mut out, usage.total_token_count.unwrap_or(0));
            out.push('}');
        }
        out.push_str("}\n\n");
        Bytes::from(out)
    }
}

/// Encode a best-effort inline error frame.
#[must_use]
pub fn error_frame(message: &str) -> Bytes {
    let mut out = String::with_capacity(40 + message.len());
    out.push_str("data: {\"error\":{\"message\":");
    push_json_string_escaped(&mut out, message);
    out.push_str("}}\n\n");
    Bytes::from(out)
}

struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        let mut frames = SmallVec::new();
        frames.reserve(capacity);
        Self { frames, head: 0 }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }

    #[inline]
    fn extend_from_vec(&mut self, produced: &mut Vec<Bytes>) {
        if produced.is_empty() {
            return;
        }
        self.frames.reserve(produced.len());
        self.frames.extend(produced.drain(..));
    }
}

/// Wire a provider byte stream through a [`StreamTranscoder`], yielding OpenAI
/// SSE frames as they are produced.
///
/// The output always ends with exactly one `data: [DONE]` frame: on normal
/// end-of-stream, and on transport errors (preceded by an inline error
/// frame). If the consumer drops the stream, the source is dropped with it
/// and nothing further is emitted.
pub fn transcode_byte_stream<S, E>(
    source: S,
    transcoder: StreamTranscoder,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(source),
            transcoder,
            PendingFrames::with_capacity(8),
            Vec::<Bytes>::with_capacity(8),
            false,
        ),
        |(mut source, mut transcoder, mut pending, mut produced, mut finished)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((frame, (source, transcoder, pending, produced, finished)));
                }
                if finished {
                    return None;
                }

                match source.as_mut().next().await {
                    Some(Ok(chunk)) => {
                        transcoder.feed(&chunk, &mut produced);
                    }
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "Gemini stream read failed");
                        produced.push(error_frame(&err.to_string()));
                        transcoder.finish(&mut produced);
                        finished = true;
                    }
                    None => {
                        transcoder.finish(&mut produced);
                        finished = true;
                    }
                }
                pending.extend_from_vec(&mut produced);
            }
        },
    )
}
