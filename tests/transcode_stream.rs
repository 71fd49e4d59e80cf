use bytes::Bytes;
use futures_util::StreamExt;
use gemini_relay::stream::{transcode_byte_stream, StreamTranscoder, DONE_FRAME};

fn transcoder() -> StreamTranscoder {
    StreamTranscoder::with_created(
        "chatcmpl-itest0000001".to_string(),
        "gemini-pro".to_string(),
        1_700_000_000,
    )
}

fn run_through(transcoder: &mut StreamTranscoder, chunks: &[&[u8]]) -> Vec<u8> {
    let mut frames = Vec::new();
    for chunk in chunks {
        transcoder.feed(chunk, &mut frames);
    }
    transcoder.finish(&mut frames);
    frames.concat()
}

const PAYLOAD: &[u8] = b"data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]}}]}\n\ndata: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" there\"}]}}]}\n\ndata: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":4,\"candidatesTokenCount\":2,\"totalTokenCount\":6}}\n\n";

#[test]
fn output_is_identical_for_every_split_point() {
    let mut whole = transcoder();
    let expected = run_through(&mut whole, &[PAYLOAD]);

    for split in 0..=PAYLOAD.len() {
        let (head, tail) = PAYLOAD.split_at(split);
        let mut tc = transcoder();
        let actual = run_through(&mut tc, &[head, tail]);
        assert_eq!(
            actual, expected,
            "transcoded output diverged when split at byte {split}"
        );
    }
}

#[test]
fn output_is_identical_when_fed_byte_at_a_time() {
    let mut whole = transcoder();
    let expected = run_through(&mut whole, &[PAYLOAD]);

    let mut tc = transcoder();
    let mut frames = Vec::new();
    for byte in PAYLOAD {
        tc.feed(std::slice::from_ref(byte), &mut frames);
    }
    tc.finish(&mut frames);
    assert_eq!(frames.concat(), expected);
}

fn ends_with_single_done(output: &[u8]) -> bool {
    let done_count = output
        .windows(DONE_FRAME.len())
        .filter(|window| *window == DONE_FRAME)
        .count();
    done_count == 1 && output.ends_with(DONE_FRAME)
}

#[test]
fn terminal_marker_for_arbitrary_inputs() {
    let inputs: &[&[u8]] = &[
        b"",
        b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"cut off",
        b"garbage that is not SSE at all\n\n",
        b"data: {not json}\n\n",
        b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"no finish\"}]}}]}\n\n",
        b": comment only\n\n",
        PAYLOAD,
    ];

    for input in inputs {
        let mut tc = transcoder();
        let output = run_through(&mut tc, &[input]);
        assert!(
            ends_with_single_done(&output),
            "expected exactly one trailing [DONE] for input {:?}",
            String::from_utf8_lossy(input)
        );
    }
}

#[test]
fn frames_share_the_call_identity() {
    let mut tc = transcoder();
    let mut frames = Vec::new();
    tc.feed(PAYLOAD, &mut frames);

    assert_eq!(frames.len(), 3);
    for frame in &frames {
        let text = std::str::from_utf8(frame).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(value["id"], "chatcmpl-itest0000001");
        assert_eq!(value["model"], "gemini-pro");
        assert_eq!(value["created"], 1_700_000_000);
    }
}

#[tokio::test]
async fn chunked_byte_stream_matches_single_chunk_output() {
    let mut reference = transcoder();
    let expected = run_through(&mut reference, &[PAYLOAD]);

    // Deliberately awkward chunk sizes so frames straddle reads.
    let chunks: Vec<Result<Bytes, std::convert::Infallible>> = PAYLOAD
        .chunks(7)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    let source = futures_util::stream::iter(chunks);

    let frames: Vec<Bytes> = transcode_byte_stream(source, transcoder()).collect().await;
    assert_eq!(frames.concat(), expected);
}

#[tokio::test]
async fn empty_byte_stream_still_terminates() {
    let source =
        futures_util::stream::iter(Vec::<Result<Bytes, std::convert::Infallible>>::new());
    let frames: Vec<Bytes> = transcode_byte_stream(source, transcoder()).collect().await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].as_ref(), DONE_FRAME);
}

#[tokio::test]
async fn mid_stream_transport_error_still_terminates() {
    let source = futures_util::stream::iter(vec![
        Ok(Bytes::from_static(
            b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"partial\"}]}}]}\n\n",
        )),
        Err("unexpected EOF"),
    ]);
    let frames: Vec<Bytes> = transcode_byte_stream(source, transcoder()).collect().await;
    let output = frames.concat();
    assert!(ends_with_single_done(&output));

    let error_frame = std::str::from_utf8(&frames[1]).unwrap();
    assert!(error_frame.contains("unexpected EOF"));
}
