//! 行分隔事件流编解码
//!
//! 帧之间以空行分隔：
//! ```text
//! {"data":{...},"error":""}
//!
//! event: ping
//!
//! {"data":null,"error":"boom"}
//! ```

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ToolFlowError};

const FRAME_TERMINATOR: &[u8] = b"\n\n";

pub type EventStreamBody = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;
pub type ValueStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// 数据帧的载荷
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BackwardsInvocationResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: String,
}

impl<T> BackwardsInvocationResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: String::new(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventFrame {
    Data(BackwardsInvocationResponse<Value>),
    Event(String),
}

/// 流式响应中的一个元素：数据或带外信号（如 `ping`）
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationChunk {
    Data(Value),
    Event(String),
}

impl From<Value> for InvocationChunk {
    fn from(value: Value) -> Self {
        InvocationChunk::Data(value)
    }
}

pub enum InvocationResponse {
    Value(Value),
    Stream(Pin<Box<dyn Stream<Item = Result<InvocationChunk>> + Send>>),
}

impl InvocationResponse {
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self> {
        Ok(InvocationResponse::Value(serde_json::to_value(model)?))
    }

    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<InvocationChunk>> + Send + 'static,
    {
        InvocationResponse::Stream(Box::pin(chunks))
    }
}

pub fn data_frame(data: Option<Value>, error: &str) -> Vec<u8> {
    let mut frame = json!({ "data": data, "error": error }).to_string().into_bytes();
    frame.extend_from_slice(FRAME_TERMINATOR);
    frame
}

pub fn event_frame(name: &str) -> Vec<u8> {
    format!("event: {name}\n\n").into_bytes()
}

/// 将响应编码为事件流
///
/// 单值编码为一帧；流中途出错时追加一帧 `{data: null, error}` 后结束。
pub fn convert_to_event_stream(response: InvocationResponse) -> EventStreamBody {
    match response {
        InvocationResponse::Value(value) => Box::pin(stream::once(async move {
            data_frame(Some(value), "")
        })),
        InvocationResponse::Stream(chunks) => {
            Box::pin(stream::unfold(Some(chunks), |state| async move {
                let mut chunks = state?;
                match chunks.next().await {
                    Some(Ok(InvocationChunk::Data(data))) => {
                        Some((data_frame(Some(data), ""), Some(chunks)))
                    }
                    Some(Ok(InvocationChunk::Event(name))) => Some((event_frame(&name), Some(chunks))),
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "event stream terminated by error");
                        Some((data_frame(None, &err.to_string()), None))
                    }
                    None => None,
                }
            }))
        }
    }
}

/// 增量解码器，按字节缓冲，多字节字符可以跨块
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// `buffer` 中已确认不含帧分隔符的前缀长度
    scanned: usize,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个数据块，返回其中已完整的帧
    ///
    /// 遇到无法解析的帧时停止，连同此前解出的帧一起返回错误；
    /// 出错后缓冲区被清空。
    pub fn push(&mut self, chunk: &[u8]) -> (Vec<EventFrame>, Option<ToolFlowError>) {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut processed = 0;
        let mut search_from = self.scanned.saturating_sub(FRAME_TERMINATOR.len() - 1);
        while let Some(end) = find_terminator(&self.buffer[search_from..]) {
            let frame_end = search_from + end;
            match parse_frame(&self.buffer[processed..frame_end]) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(err) => {
                    self.clear();
                    return (frames, Some(err));
                }
            }
            processed = frame_end + FRAME_TERMINATOR.len();
            search_from = processed;
        }

        if processed > 0 {
            self.buffer.drain(..processed);
        }
        self.scanned = self.buffer.len();
        (frames, None)
    }

    /// 输入结束；残留的半帧视为解码错误
    pub fn finish(&mut self) -> Result<()> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if rest.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(ToolFlowError::Decode(format!(
                "stream ended inside a frame ({} bytes pending)",
                rest.len()
            )))
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_TERMINATOR.len())
        .position(|window| window == FRAME_TERMINATOR)
}

fn parse_frame(raw: &[u8]) -> Result<Option<EventFrame>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ToolFlowError::Decode(format!("frame is not valid UTF-8: {e}")))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(name) = text.strip_prefix("event:") {
        return Ok(Some(EventFrame::Event(name.trim().to_string())));
    }

    let body = text
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(text);
    let response: BackwardsInvocationResponse<Value> = serde_json::from_str(body)
        .map_err(|e| ToolFlowError::Decode(format!("invalid frame JSON: {e}: {body}")))?;
    Ok(Some(EventFrame::Data(response)))
}

struct DecodeState {
    bytes: ByteStream,
    decoder: EventStreamDecoder,
    pending: VecDeque<Result<Value>>,
    done: bool,
}

impl DecodeState {
    fn accept(&mut self, frames: Vec<EventFrame>) {
        for frame in frames {
            match frame {
                EventFrame::Event(name) => tracing::trace!(event = %name, "event frame"),
                EventFrame::Data(response) if response.is_error() => {
                    self.pending
                        .push_back(Err(ToolFlowError::PluginDaemon(response.error)));
                    self.done = true;
                    return;
                }
                EventFrame::Data(BackwardsInvocationResponse { data: None, .. }) => {}
                EventFrame::Data(BackwardsInvocationResponse {
                    data: Some(data), ..
                }) => self.pending.push_back(Ok(data)),
            }
        }
    }

    fn fail(&mut self, err: ToolFlowError) {
        self.pending.push_back(Err(err));
        self.done = true;
    }
}

/// 把字节流解码为数据帧载荷序列
///
/// 事件帧被忽略；带 `error` 的帧产出一个错误后结束。
pub fn decode_event_stream(bytes: ByteStream) -> ValueStream {
    let state = DecodeState {
        bytes,
        decoder: EventStreamDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let (frames, error) = state.decoder.push(&chunk);
                    state.accept(frames);
                    if let Some(err) = error {
                        if !state.done {
                            state.fail(err);
                        }
                    }
                }
                Some(Err(err)) => state.fail(err),
                None => {
                    state.done = true;
                    if let Err(err) = state.decoder.finish() {
                        state.pending.push_back(Err(err));
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_ok(decoder: &mut EventStreamDecoder, chunk: &[u8]) -> Vec<EventFrame> {
        let (frames, error) = decoder.push(chunk);
        assert!(error.is_none(), "unexpected decode error: {error:?}");
        frames
    }

    #[test]
    fn decoder_splits_frames_across_chunks() {
        let mut decoder = EventStreamDecoder::new();
        assert!(push_ok(&mut decoder, b"{\"data\":{\"k\":1},").is_empty());
        let frames = push_ok(&mut decoder, b"\"error\":\"\"}\n\nevent: ping\n\n{\"da");
        assert_eq!(
            frames,
            vec![
                EventFrame::Data(BackwardsInvocationResponse::data(json!({"k": 1}))),
                EventFrame::Event("ping".into()),
            ]
        );
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_between_chunks() {
        let frame = data_frame(Some(json!("你好")), "");
        let (head, tail) = frame.split_at(10);
        let mut decoder = EventStreamDecoder::new();
        assert!(push_ok(&mut decoder, head).is_empty());
        let frames = push_ok(&mut decoder, tail);
        assert_eq!(
            frames,
            vec![EventFrame::Data(BackwardsInvocationResponse::data(json!("你好")))]
        );
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn decoder_finds_terminator_split_between_chunks() {
        let mut decoder = EventStreamDecoder::new();
        assert!(push_ok(&mut decoder, b"{\"data\":1,\"error\":\"\"}\n").is_empty());
        assert_eq!(decoder.scanned, decoder.buffer.len());
        let frames = push_ok(&mut decoder, b"\n");
        assert_eq!(
            frames,
            vec![EventFrame::Data(BackwardsInvocationResponse::data(json!(1)))]
        );
        assert!(decoder.buffer.is_empty());
        assert_eq!(decoder.scanned, 0);
    }

    #[test]
    fn decoder_rejects_bad_json() {
        let mut decoder = EventStreamDecoder::new();
        let (frames, error) = decoder.push(b"{not json}\n\n");
        assert!(frames.is_empty());
        assert!(matches!(error, Some(ToolFlowError::Decode(_))));
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn frames_have_stable_shape() {
        assert_eq!(
            data_frame(None, "boom"),
            b"{\"data\":null,\"error\":\"boom\"}\n\n".to_vec()
        );
        assert_eq!(event_frame("ping"), b"event: ping\n\n".to_vec());
    }
}
