use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use toolflow::plugin::event_stream::{data_frame, event_frame, ByteStream};
use toolflow::plugin::{
    convert_to_event_stream, decode_event_stream, BackwardsInvocationResponse, EventFrame,
    EventStreamDecoder, InvocationChunk, InvocationResponse,
};
use toolflow::{Result, ToolFlowError};

#[derive(Serialize)]
struct Forecast {
    city: String,
    high: i64,
}

async fn encode(response: InvocationResponse) -> Vec<Vec<u8>> {
    convert_to_event_stream(response).collect().await
}

fn decode_all(frames: &[Vec<u8>]) -> anyhow::Result<Vec<EventFrame>> {
    let mut decoder = EventStreamDecoder::new();
    let mut decoded = Vec::new();
    for frame in frames {
        let (parsed, error) = decoder.push(frame);
        decoded.extend(parsed);
        if let Some(err) = error {
            return Err(err.into());
        }
    }
    decoder.finish()?;
    Ok(decoded)
}

fn byte_stream(chunks: Vec<&'static str>) -> ByteStream {
    Box::pin(stream::iter(
        chunks.into_iter().map(|chunk| Ok(chunk.as_bytes().to_vec())),
    ))
}

#[tokio::test]
async fn single_model_becomes_one_frame() -> anyhow::Result<()> {
    let forecast = Forecast {
        city: "Berlin".into(),
        high: 21,
    };
    let frames = encode(InvocationResponse::from_model(&forecast)?).await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0].ends_with(b"\n\n"));

    let decoded = decode_all(&frames)?;
    assert_eq!(
        decoded,
        vec![EventFrame::Data(BackwardsInvocationResponse::data(
            json!({"city": "Berlin", "high": 21})
        ))]
    );
    Ok(())
}

#[tokio::test]
async fn ping_then_model_yields_two_frames() -> anyhow::Result<()> {
    let chunks = stream::iter(vec![
        Ok(InvocationChunk::Event("ping".into())),
        Ok(InvocationChunk::Data(json!({"k": "v"}))),
    ]);
    let frames = encode(InvocationResponse::from_stream(chunks)).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], b"event: ping\n\n".to_vec());
    assert_eq!(frames[0], event_frame("ping"));

    let decoded = decode_all(&frames)?;
    assert_eq!(
        decoded[1],
        EventFrame::Data(BackwardsInvocationResponse::data(json!({"k": "v"})))
    );
    Ok(())
}

#[tokio::test]
async fn mid_stream_error_ends_with_error_frame() -> anyhow::Result<()> {
    let chunks = stream::iter(vec![
        Ok(InvocationChunk::from(json!(1))),
        Ok(InvocationChunk::from(json!(2))),
        Err(ToolFlowError::Transport("socket closed".into())),
        Ok(InvocationChunk::from(json!(3))),
    ]);
    let frames = encode(InvocationResponse::from_stream(chunks)).await;
    assert_eq!(frames.len(), 3);

    let decoded = decode_all(&frames)?;
    match &decoded[2] {
        EventFrame::Data(response) => {
            assert!(response.data.is_none());
            assert!(response.is_error());
            assert!(response.error.contains("socket closed"));
        }
        other => panic!("expected error data frame, got {other:?}"),
    }
    Ok(())
}

#[test]
fn frame_shape_is_stable() {
    assert_eq!(
        data_frame(Some(json!({"a": 1})), ""),
        b"{\"data\":{\"a\":1},\"error\":\"\"}\n\n".to_vec()
    );
    assert_eq!(
        data_frame(None, "boom"),
        b"{\"data\":null,\"error\":\"boom\"}\n\n".to_vec()
    );
}

#[test]
fn decoder_accepts_data_prefix_and_blank_padding() -> anyhow::Result<()> {
    let mut decoder = EventStreamDecoder::new();
    let (frames, error) = decoder.push(b"\n\ndata: {\"data\":true,\"error\":\"\"}\n\n");
    assert!(error.is_none());
    assert_eq!(
        frames,
        vec![EventFrame::Data(BackwardsInvocationResponse::data(json!(true)))]
    );
    decoder.finish()?;
    Ok(())
}

#[test]
fn decoder_rejects_garbage_frames() {
    let mut decoder = EventStreamDecoder::new();
    let (frames, error) = decoder.push(b"not json\n\n");
    assert!(frames.is_empty());
    assert!(matches!(error, Some(ToolFlowError::Decode(_))));
}

#[test]
fn decoder_returns_frames_parsed_before_a_bad_one() {
    let mut decoder = EventStreamDecoder::new();
    let (frames, error) =
        decoder.push(b"{\"data\":{\"n\":1},\"error\":\"\"}\n\n{bad}\n\n{\"data\":2,\"error\":\"\"}\n\n");
    assert_eq!(
        frames,
        vec![EventFrame::Data(BackwardsInvocationResponse::data(json!({"n": 1})))]
    );
    assert!(matches!(error, Some(ToolFlowError::Decode(_))));
}

#[test]
fn decoder_handles_large_frame_fed_byte_by_byte() -> anyhow::Result<()> {
    let payload = "x".repeat(64 * 1024);
    let frame = data_frame(Some(json!({ "blob": payload })), "");

    let mut decoder = EventStreamDecoder::new();
    let mut decoded = Vec::new();
    for byte in &frame {
        let (frames, error) = decoder.push(std::slice::from_ref(byte));
        assert!(error.is_none());
        decoded.extend(frames);
    }
    decoder.finish()?;
    assert_eq!(
        decoded,
        vec![EventFrame::Data(BackwardsInvocationResponse::data(
            json!({ "blob": payload })
        ))]
    );
    Ok(())
}

#[tokio::test]
async fn decode_event_stream_reassembles_chunked_frames() -> anyhow::Result<()> {
    let bytes = byte_stream(vec![
        "{\"data\":{\"n\":1},\"er",
        "ror\":\"\"}\n",
        "\nevent: ping\n\n{\"data\":null,\"error\":\"\"}\n\n{\"data\":{\"n\":2},\"error\":\"\"}\n\n",
    ]);
    let values: Vec<Result<Value>> = decode_event_stream(bytes).collect().await;
    let values = values.into_iter().collect::<Result<Vec<_>>>()?;
    assert_eq!(values, vec![json!({"n": 1}), json!({"n": 2})]);
    Ok(())
}

#[tokio::test]
async fn decode_event_stream_keeps_values_before_corrupt_frame() -> anyhow::Result<()> {
    let bytes = byte_stream(vec![
        "{\"data\":{\"n\":1},\"error\":\"\"}\n\n{bad}\n\n",
        "{\"data\":{\"n\":2},\"error\":\"\"}\n\n",
    ]);
    let values: Vec<Result<Value>> = decode_event_stream(bytes).collect().await;
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_ref().ok(), Some(&json!({"n": 1})));
    assert!(matches!(values[1], Err(ToolFlowError::Decode(_))));
    Ok(())
}

#[tokio::test]
async fn decode_event_stream_stops_at_error_frame() -> anyhow::Result<()> {
    let bytes = byte_stream(vec![
        "{\"data\":\"first\",\"error\":\"\"}\n\n",
        "{\"data\":null,\"error\":\"quota exceeded\"}\n\n",
        "{\"data\":\"late\",\"error\":\"\"}\n\n",
    ]);
    let values: Vec<Result<Value>> = decode_event_stream(bytes).collect().await;
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_ref().ok(), Some(&json!("first")));
    match &values[1] {
        Err(ToolFlowError::PluginDaemon(message)) => assert_eq!(message, "quota exceeded"),
        other => panic!("expected plugin daemon error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn truncated_stream_reports_decode_error() -> anyhow::Result<()> {
    let bytes = byte_stream(vec!["{\"data\":1,\"error\":\"\"}\n\n{\"data\":2"]);
    let values: Vec<Result<Value>> = decode_event_stream(bytes).collect().await;
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_ref().ok(), Some(&json!(1)));
    assert!(matches!(values[1], Err(ToolFlowError::Decode(_))));
    Ok(())
}
