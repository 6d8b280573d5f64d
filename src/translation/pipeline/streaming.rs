//! 流式翻译支持
//!
//! 翻译器的流式接口有多种返回形态，[`StringChunks`] 把它们统一成字符串片段
//! 序列。长文本优先走流式接口，失败或没有输出时退回普通翻译。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use encoding_rs::{CoderResult, Decoder, UTF_8};
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::translation::bridge::BridgeTransport;
use crate::translation::capability::{ChunkReader, StreamChunk, StreamSource, TranslatorHandle};
use crate::translation::error::{TranslationError, TranslationResult};

// ============================================================================
// 翻译途径
// ============================================================================

/// 一次翻译使用的途径
#[derive(Clone)]
pub enum TranslationRoute<'a> {
    /// 本地翻译器
    Local(Arc<dyn TranslatorHandle>),
    /// 经页面桥接转发，不支持流式；使用前需要已注入桥接
    Bridge {
        transport: &'a BridgeTransport,
        source: &'a str,
        target: &'a str,
    },
    /// 没有可用途径，翻译结果为空
    Unavailable,
}

impl TranslationRoute<'_> {
    pub fn supports_streaming(&self) -> bool {
        matches!(self, Self::Local(handle) if handle.supports_streaming())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub async fn translate(&self, text: &str) -> TranslationResult<String> {
        match self {
            Self::Local(handle) => handle.translate(text.to_string()).await,
            Self::Bridge {
                transport,
                source,
                target,
            } => transport.request(text, source, target).await,
            Self::Unavailable => Err(TranslationError::CapabilityUnavailable(
                "没有可用的翻译途径".to_string(),
            )),
        }
    }
}

// ============================================================================
// 读取句柄与取消
// ============================================================================

/// 当前流式读取的句柄
#[derive(Debug, Clone, Default)]
pub struct ReaderHandle {
    id: u64,
    token: CancellationToken,
}

impl ReaderHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// 会话内的流式读取
///
/// 实时输出只有一路，新的请求会取消旧的读取；批次与按需翻译的读取互不
/// 影响，只在会话重置时一起取消。
#[derive(Debug, Default)]
pub struct LiveTranslation {
    next_id: AtomicU64,
    current: Mutex<Option<ReaderHandle>>,
    session: Mutex<CancellationToken>,
}

impl LiveTranslation {
    pub fn new() -> Self {
        Self::default()
    }

    fn child_token(&self) -> CancellationToken {
        self.session
            .lock()
            .map(|token| token.child_token())
            .unwrap_or_default()
    }

    fn next_handle(&self) -> ReaderHandle {
        ReaderHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            token: self.child_token(),
        }
    }

    /// 开始新的实时输出，之前的实时输出被取消
    pub fn begin(&self) -> ReaderHandle {
        let handle = self.next_handle();

        if let Ok(mut slot) = self.current.lock() {
            if let Some(previous) = slot.replace(handle.clone()) {
                tracing::debug!(reader = previous.id, "取消上一次流式读取");
                previous.cancel();
            }
        }
        handle
    }

    /// 独立的读取句柄，不占用实时输出，也不会被它取消
    pub fn reader(&self) -> ReaderHandle {
        self.next_handle()
    }

    /// 实时输出结束，只清除仍属于该句柄的记录
    pub fn finish(&self, handle: &ReaderHandle) {
        if let Ok(mut slot) = self.current.lock() {
            if slot.as_ref().map(|current| current.id) == Some(handle.id) {
                *slot = None;
            }
        }
    }

    pub fn cancel_current(&self) {
        if let Ok(mut slot) = self.current.lock() {
            if let Some(current) = slot.take() {
                current.cancel();
            }
        }
    }

    /// 取消会话内的全部读取，之后发出的句柄不受影响
    pub fn cancel_all(&self) {
        self.cancel_current();
        if let Ok(mut session) = self.session.lock() {
            let previous = std::mem::take(&mut *session);
            previous.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

// ============================================================================
// 片段归一化
// ============================================================================

enum ChunkSource {
    Stream(BoxStream<'static, TranslationResult<StreamChunk>>),
    Reader(Box<dyn ChunkReader>),
    Array(std::vec::IntoIter<StreamChunk>),
    Text(Option<String>),
}

/// 统一后的字符串片段序列
pub struct StringChunks {
    source: ChunkSource,
    decoder: Decoder,
    cancel: CancellationToken,
    finished: bool,
    cancelled: bool,
}

impl StringChunks {
    pub fn new(source: StreamSource, cancel: CancellationToken) -> Self {
        let source = match source {
            StreamSource::AsyncIterable(stream) => ChunkSource::Stream(stream),
            StreamSource::Readable(reader) => ChunkSource::Reader(reader),
            StreamSource::Array(items) => ChunkSource::Array(items.into_iter()),
            StreamSource::Text(text) => ChunkSource::Text(Some(text)),
        };

        Self {
            source,
            decoder: UTF_8.new_decoder_without_bom_handling(),
            cancel,
            finished: false,
            cancelled: false,
        }
    }

    /// 读取是否因取消而结束
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// 下一个非空片段，`None` 表示结束
    pub async fn next_chunk(&mut self) -> TranslationResult<Option<String>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let token = self.cancel.clone();
            let raw = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancelled = true;
                    self.release().await;
                    return Ok(None);
                }
                raw = self.read_raw() => raw,
            };

            match raw {
                Ok(Some(chunk)) => {
                    let text = self.chunk_to_string(chunk);
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                Ok(None) => {
                    self.release().await;
                    let tail = self.decode(&[], true);
                    if !tail.is_empty() {
                        return Ok(Some(tail));
                    }
                }
                Err(e) => {
                    self.release().await;
                    return Err(e);
                }
            }
        }
    }

    /// 读完全部片段，每个片段交给 `sink`，返回拼接结果
    pub async fn drain_into(&mut self, sink: &mut (dyn FnMut(&str) + '_)) -> TranslationResult<String> {
        let mut collected = String::new();
        while let Some(text) = self.next_chunk().await? {
            sink(&text);
            collected.push_str(&text);
        }
        Ok(collected)
    }

    async fn read_raw(&mut self) -> TranslationResult<Option<StreamChunk>> {
        match &mut self.source {
            ChunkSource::Stream(stream) => stream.next().await.transpose(),
            ChunkSource::Reader(reader) => reader.read().await,
            ChunkSource::Array(items) => Ok(items.next()),
            ChunkSource::Text(text) => Ok(text.take().map(StreamChunk::Text)),
        }
    }

    /// 标记结束；可读流无论成功与否都要取消底层读取
    async fn release(&mut self) {
        self.finished = true;
        if let ChunkSource::Reader(reader) = &mut self.source {
            reader.cancel().await;
        }
    }

    fn chunk_to_string(&mut self, chunk: StreamChunk) -> String {
        match chunk {
            StreamChunk::Text(text) => text,
            StreamChunk::Bytes(bytes) => self.decode(&bytes, false),
            StreamChunk::Object(value) => match value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Object(map) => map
                    .get("text")
                    .and_then(|text| text.as_str())
                    .map(str::to_string)
                    .unwrap_or_default(),
                other => other.to_string(),
            },
        }
    }

    fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let mut out = String::new();
        let mut remaining = bytes;

        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len() * 3 + 4);
            out.reserve(needed);

            let (result, read, _) = self.decoder.decode_to_string(remaining, &mut out, last);
            remaining = &remaining[read..];
            if let CoderResult::InputEmpty = result {
                break;
            }
        }

        out
    }
}

// ============================================================================
// 单行翻译
// ============================================================================

/// 单行翻译结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTranslation {
    pub text: String,
    /// 结果来自流式输出
    pub streamed: bool,
    /// 流式读取被取消
    pub cancelled: bool,
}

/// 按长度选择流式或普通翻译
///
/// 流式输出的每个片段都交给 `sink`。流式接口失败或没有任何输出时退回
/// 一次普通调用，此时 `sink` 不会收到退回后的结果。
pub async fn translate_line_with_streaming_support(
    route: &TranslationRoute<'_>,
    line: &str,
    threshold: usize,
    sink: &mut (dyn FnMut(&str) + '_),
    reader: Option<&ReaderHandle>,
) -> TranslationResult<LineTranslation> {
    if let TranslationRoute::Local(handle) = route {
        if handle.supports_streaming() && line.chars().count() >= threshold {
            match handle.translate_streaming(line.to_string()).await {
                Ok(source) => {
                    let token = reader.map(ReaderHandle::token).unwrap_or_default();
                    let mut chunks = StringChunks::new(source, token);

                    match chunks.drain_into(sink).await {
                        Ok(text) if chunks.was_cancelled() => {
                            return Ok(LineTranslation {
                                text,
                                streamed: true,
                                cancelled: true,
                            });
                        }
                        Ok(text) if !text.is_empty() => {
                            return Ok(LineTranslation {
                                text,
                                streamed: true,
                                cancelled: false,
                            });
                        }
                        Ok(_) => tracing::debug!("流式翻译没有输出，改用普通翻译"),
                        Err(e) => tracing::debug!(error = %e, "流式翻译失败，改用普通翻译"),
                    }
                }
                Err(e) => tracing::debug!(error = %e, "无法开始流式翻译"),
            }
        }
    }

    let text = route.translate(line).await?;
    Ok(LineTranslation {
        text,
        streamed: false,
        cancelled: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    async fn drain(source: StreamSource) -> String {
        let mut chunks = StringChunks::new(source, CancellationToken::new());
        chunks.drain_into(&mut |_| {}).await.unwrap()
    }

    #[tokio::test]
    async fn test_normalizes_every_source_shape() {
        assert_eq!(drain(StreamSource::Text("whole".into())).await, "whole");

        let array = StreamSource::Array(vec![
            StreamChunk::Text("a".into()),
            StreamChunk::Object(serde_json::json!({"text": "b"})),
            StreamChunk::Object(serde_json::json!({"other": 1})),
            StreamChunk::Bytes("c".as_bytes().to_vec()),
        ]);
        assert_eq!(drain(array).await, "abc");

        let stream = futures::stream::iter(vec![
            Ok(StreamChunk::Text("x".into())),
            Ok(StreamChunk::Text(String::new())),
            Ok(StreamChunk::Text("y".into())),
        ])
        .boxed();
        assert_eq!(drain(StreamSource::AsyncIterable(stream)).await, "xy");
    }

    #[tokio::test]
    async fn test_bytes_split_inside_multibyte_char() {
        let bytes = "你好".as_bytes();
        let source = StreamSource::Array(vec![
            StreamChunk::Bytes(bytes[..2].to_vec()),
            StreamChunk::Bytes(bytes[2..4].to_vec()),
            StreamChunk::Bytes(bytes[4..].to_vec()),
        ]);
        assert_eq!(drain(source).await, "你好");
    }

    struct SlowReader {
        remaining: Vec<&'static str>,
        cancelled: Arc<AtomicBool>,
    }

    impl ChunkReader for SlowReader {
        fn read(&mut self) -> BoxFuture<'_, TranslationResult<Option<StreamChunk>>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(self.remaining.pop().map(|s| StreamChunk::Text(s.to_string())))
            })
        }

        fn cancel(&mut self) -> BoxFuture<'_, ()> {
            self.cancelled.store(true, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readable_is_cancelled_after_completion() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let reader = SlowReader {
            remaining: vec!["two", "one "],
            cancelled: cancelled.clone(),
        };
        let text = drain(StreamSource::Readable(Box::new(reader))).await;
        assert_eq!(text, "one two");
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseding_request_cancels_reader() {
        let live = LiveTranslation::new();
        let first = live.begin();

        let cancelled = Arc::new(AtomicBool::new(false));
        let reader = SlowReader {
            remaining: vec!["c", "b", "a"],
            cancelled: cancelled.clone(),
        };
        let mut chunks = StringChunks::new(StreamSource::Readable(Box::new(reader)), first.token());

        assert_eq!(chunks.next_chunk().await.unwrap().as_deref(), Some("a"));

        let second = live.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        assert_eq!(chunks.next_chunk().await.unwrap(), None);
        assert!(chunks.was_cancelled());
        assert!(cancelled.load(Ordering::SeqCst));

        live.finish(&first);
        assert!(live.is_active());
        live.finish(&second);
        assert!(!live.is_active());
    }

    #[test]
    fn test_independent_readers_survive_live_output() {
        let live = LiveTranslation::new();
        let page = live.reader();
        let hover = live.reader();

        let output = live.begin();
        live.begin();

        assert!(output.is_cancelled());
        assert!(!page.is_cancelled());
        assert!(!hover.is_cancelled());

        live.cancel_all();
        assert!(page.is_cancelled());
        assert!(hover.is_cancelled());
        assert!(!live.is_active());

        // 重置之后的新句柄不受影响
        assert!(!live.reader().is_cancelled());
    }

    struct Streamer {
        streamed: Arc<AtomicBool>,
        fail_stream: bool,
    }

    impl TranslatorHandle for Streamer {
        fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
            Box::pin(async move { Ok(format!("plain:{}", text.len())) })
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        fn translate_streaming(&self, _text: String) -> BoxFuture<'_, TranslationResult<StreamSource>> {
            self.streamed.store(true, Ordering::SeqCst);
            let fail = self.fail_stream;
            Box::pin(async move {
                if fail {
                    Ok(StreamSource::Array(vec![]))
                } else {
                    Ok(StreamSource::Array(vec![
                        StreamChunk::Text("s1".into()),
                        StreamChunk::Text("s2".into()),
                    ]))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let streamed = Arc::new(AtomicBool::new(false));
        let route = TranslationRoute::Local(Arc::new(Streamer {
            streamed: streamed.clone(),
            fail_stream: false,
        }));

        let short = "a".repeat(499);
        let result = translate_line_with_streaming_support(&route, &short, 500, &mut |_| {}, None)
            .await
            .unwrap();
        assert_eq!(result.text, "plain:499");
        assert!(!streamed.load(Ordering::SeqCst));

        let long = "a".repeat(500);
        let mut seen = Vec::new();
        let result = translate_line_with_streaming_support(
            &route,
            &long,
            500,
            &mut |chunk| seen.push(chunk.to_string()),
            None,
        )
        .await
        .unwrap();
        assert!(result.streamed);
        assert_eq!(result.text, "s1s2");
        assert_eq!(seen, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_empty_stream_falls_back_to_plain_call() {
        let route = TranslationRoute::Local(Arc::new(Streamer {
            streamed: Arc::new(AtomicBool::new(false)),
            fail_stream: true,
        }));
        let long = "b".repeat(600);
        let result = translate_line_with_streaming_support(&route, &long, 500, &mut |_| {}, None)
            .await
            .unwrap();
        assert!(!result.streamed);
        assert_eq!(result.text, "plain:600");
    }

    #[tokio::test]
    async fn test_unavailable_route_errors() {
        let err = TranslationRoute::Unavailable.translate("x").await.unwrap_err();
        assert!(matches!(err, TranslationError::CapabilityUnavailable(_)));
    }
}
