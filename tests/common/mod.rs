// 集成测试公共模块
//
// 带调用计数的假翻译能力、记录提示的反馈界面和 HTML 辅助函数

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, LocalBoxFuture};
use markup5ever_rcdom::{Handle, RcDom};

use native_translate::feedback::{classify, FeedbackState, FeedbackSurface};
use native_translate::parsers::html::dom::{find_by_id, find_nodes, get_node_attr};
use native_translate::parsers::html::{html_to_dom, serialize_node};
use native_translate::translation::capability::{
    Availability, ChunkReader, CreateOptions, DetectionCandidate, LanguageDetectorFactory,
    LanguageDetectorHandle, LegacyAvailability, LegacyTranslationApi, StaticCapabilityHost,
    StreamChunk, StreamSource, TranslatorFactory, TranslatorHandle,
};
use native_translate::translation::storage::ExtensionStorage;
use native_translate::translation::{
    constants, SessionContext, TranslationConfig, TranslationResult, TranslationService,
};

// ============================================================================
// 假翻译器
// ============================================================================

/// 已知的词条，其余文本译为 `[目标语言] 原文`
fn fake_translation(target: &str, text: &str) -> String {
    match (target, text) {
        ("fr", "Hello") => "Bonjour".to_string(),
        ("fr", "Good morning") => "Bonjour à tous".to_string(),
        ("de", "Hello") => "Hallo".to_string(),
        (_, text) if text.trim().is_empty() => String::new(),
        (target, text) => format!("[{}] {}", target, text),
    }
}

/// 翻译器调用计数
#[derive(Debug, Default)]
pub struct CallCounters {
    pub created: AtomicUsize,
    pub translate: AtomicUsize,
    pub streaming: AtomicUsize,
    pub availability: AtomicUsize,
}

impl CallCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn translate(&self) -> usize {
        self.translate.load(Ordering::SeqCst)
    }

    pub fn streaming(&self) -> usize {
        self.streaming.load(Ordering::SeqCst)
    }
}

/// 翻译器行为
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// 原样返回，用于检查标记还原
    pub identity: bool,
    pub streaming: bool,
    /// 每次翻译前等待
    pub delay: Duration,
    pub availability: Availability,
    /// 创建时依次报告的下载进度
    pub progress: Vec<f64>,
    /// 非零时流式输出改为逐段读取的可读流，每段之间等待
    pub chunk_delay: Duration,
    /// 译文中丢掉图片这类独立标记
    pub drop_void_markers: bool,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            identity: false,
            streaming: false,
            delay: Duration::ZERO,
            availability: Availability::Available,
            progress: Vec::new(),
            chunk_delay: Duration::ZERO,
            drop_void_markers: false,
        }
    }
}

/// 去掉 `[[NT1]]` 这类独立标记，成对的 `_S`/`_E` 标记保留
fn without_void_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let Some(len) = rest[start..].find("]]") else {
            break;
        };
        let inner = &rest[start + 2..start + len];
        let is_void = inner
            .strip_prefix("NT")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        out.push_str(&rest[..start]);
        if !is_void {
            out.push_str(&rest[start..start + len + 2]);
        }
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    out
}

/// 按字符数切成若干段
fn split_chunks(text: &str, parts: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = chars.len().div_ceil(parts.max(1)).max(1);
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// 每段之间等待的可读流
pub struct SlowChunks {
    chunks: std::collections::VecDeque<String>,
    delay: Duration,
}

impl ChunkReader for SlowChunks {
    fn read(&mut self) -> BoxFuture<'_, TranslationResult<Option<StreamChunk>>> {
        async move {
            tokio::time::sleep(self.delay).await;
            Ok(self.chunks.pop_front().map(StreamChunk::Text))
        }
        .boxed()
    }

    fn cancel(&mut self) -> BoxFuture<'_, ()> {
        self.chunks.clear();
        async {}.boxed()
    }
}

pub struct FakeTranslator {
    target: String,
    behavior: FakeBehavior,
    counters: Arc<CallCounters>,
}

impl FakeTranslator {
    fn render(&self, text: &str) -> String {
        let rendered = if self.behavior.identity {
            text.to_string()
        } else {
            fake_translation(&self.target, text)
        };
        if self.behavior.drop_void_markers {
            without_void_markers(&rendered)
        } else {
            rendered
        }
    }
}

impl TranslatorHandle for FakeTranslator {
    fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
        async move {
            self.counters.translate.fetch_add(1, Ordering::SeqCst);
            if !self.behavior.delay.is_zero() {
                tokio::time::sleep(self.behavior.delay).await;
            }
            Ok(self.render(&text))
        }
        .boxed()
    }

    fn supports_streaming(&self) -> bool {
        self.behavior.streaming
    }

    fn translate_streaming(&self, text: String) -> BoxFuture<'_, TranslationResult<StreamSource>> {
        async move {
            self.counters.streaming.fetch_add(1, Ordering::SeqCst);
            let rendered = self.render(&text);
            if !self.behavior.chunk_delay.is_zero() {
                return Ok(StreamSource::Readable(Box::new(SlowChunks {
                    chunks: split_chunks(&rendered, 5).into(),
                    delay: self.behavior.chunk_delay,
                })));
            }
            let middle = rendered
                .char_indices()
                .nth(rendered.chars().count() / 2)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let (head, tail) = rendered.split_at(middle);
            Ok(StreamSource::Array(vec![
                StreamChunk::Text(head.to_string()),
                StreamChunk::Text(tail.to_string()),
            ]))
        }
        .boxed()
    }
}

/// 新版翻译器工厂
pub struct FakeFactory {
    pub behavior: FakeBehavior,
    pub counters: Arc<CallCounters>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Self::with_behavior(FakeBehavior::default())
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            counters: Arc::new(CallCounters::default()),
        })
    }
}

impl TranslatorFactory for FakeFactory {
    fn availability<'a>(
        &'a self,
        _source: &'a str,
        _target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Availability>> {
        self.counters.availability.fetch_add(1, Ordering::SeqCst);
        let availability = self.behavior.availability;
        async move { Ok(availability) }.boxed()
    }

    fn create(
        &self,
        options: CreateOptions,
    ) -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>> {
        async move {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            for loaded in &self.behavior.progress {
                options.monitor.report_loaded(*loaded);
                tokio::task::yield_now().await;
            }
            Ok(Arc::new(FakeTranslator {
                target: options.target,
                behavior: self.behavior.clone(),
                counters: self.counters.clone(),
            }) as Arc<dyn TranslatorHandle>)
        }
        .boxed()
    }
}

/// 旧版单对象接口
pub struct FakeLegacyApi {
    pub counters: Arc<CallCounters>,
}

impl FakeLegacyApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(CallCounters::default()),
        })
    }
}

impl LegacyTranslationApi for FakeLegacyApi {
    fn can_translate<'a>(
        &'a self,
        _source: &'a str,
        _target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<LegacyAvailability>> {
        async { Ok(LegacyAvailability::Readily) }.boxed()
    }

    fn create_translator<'a>(
        &'a self,
        _source: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Arc<dyn TranslatorHandle>>> {
        async move {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeTranslator {
                target: target.to_string(),
                behavior: FakeBehavior::default(),
                counters: self.counters.clone(),
            }) as Arc<dyn TranslatorHandle>)
        }
        .boxed()
    }
}

// ============================================================================
// 假语言检测
// ============================================================================

/// 总是返回同一种语言
pub struct FixedDetector {
    pub language: String,
}

impl LanguageDetectorHandle for FixedDetector {
    fn detect(&self, _text: String) -> BoxFuture<'_, TranslationResult<Vec<DetectionCandidate>>> {
        let language = self.language.clone();
        async move {
            Ok(vec![DetectionCandidate {
                language,
                confidence: 0.95,
            }])
        }
        .boxed()
    }
}

pub struct FixedDetectorFactory {
    pub language: String,
}

impl FixedDetectorFactory {
    pub fn new(language: &str) -> Arc<Self> {
        Arc::new(Self {
            language: language.to_string(),
        })
    }
}

impl LanguageDetectorFactory for FixedDetectorFactory {
    fn availability(&self) -> BoxFuture<'_, TranslationResult<Availability>> {
        async { Ok(Availability::Available) }.boxed()
    }

    fn create(&self) -> BoxFuture<'_, TranslationResult<Arc<dyn LanguageDetectorHandle>>> {
        let detector = FixedDetector {
            language: self.language.clone(),
        };
        async move { Ok(Arc::new(detector) as Arc<dyn LanguageDetectorHandle>) }.boxed()
    }
}

// ============================================================================
// 测试环境
// ============================================================================

/// 源语言为英文、带新版工厂的宿主
pub fn english_host(factory: Arc<FakeFactory>) -> StaticCapabilityHost {
    StaticCapabilityHost::new()
        .with_modern(factory)
        .with_detector(FixedDetectorFactory::new("en"))
}

/// 快速的计时配置，只在需要真实计时的测试里保留默认值
pub fn test_config() -> TranslationConfig {
    TranslationConfig {
        adapter_wait_ms: 300,
        adapter_poll_ms: 50,
        ..TranslationConfig::default()
    }
}

pub fn service_with_host(host: StaticCapabilityHost) -> TranslationService {
    TranslationService::new(SessionContext::new(
        Arc::new(host),
        Arc::new(ExtensionStorage::in_memory()),
        test_config(),
    ))
}

pub fn english_service(factory: Arc<FakeFactory>) -> TranslationService {
    service_with_host(english_host(factory))
}

// ============================================================================
// 记录提示
// ============================================================================

/// 记录所有提示的反馈界面
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    pub messages: RefCell<Vec<String>>,
    pub dismissed: RefCell<usize>,
}

impl RecordingFeedback {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }

    pub fn states(&self) -> Vec<FeedbackState> {
        self.messages.borrow().iter().map(|m| classify(m)).collect()
    }
}

impl FeedbackSurface for RecordingFeedback {
    fn show(&self, message: &str) -> FeedbackState {
        self.messages.borrow_mut().push(message.to_string());
        classify(message)
    }

    fn dismiss(&self) -> LocalBoxFuture<'_, ()> {
        *self.dismissed.borrow_mut() += 1;
        async {}.boxed_local()
    }
}

// ============================================================================
// HTML 辅助
// ============================================================================

pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").expect("test html should parse")
    }

    pub fn by_id(dom: &RcDom, id: &str) -> Handle {
        find_by_id(&dom.document, id).unwrap_or_else(|| panic!("element #{} not found", id))
    }

    pub fn html(node: &Handle) -> String {
        // Document 节点本身无法以 IncludeNode 方式序列化，逐个序列化其子节点
        if let markup5ever_rcdom::NodeData::Document = node.data {
            return node.children.borrow().iter().map(serialize_node).collect();
        }
        serialize_node(node)
    }

    /// 生成指定词数的英文句子
    pub fn words(count: usize) -> String {
        const WORDS: &[&str] = &[
            "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "while", "readers",
        ];
        (0..count)
            .map(|i| WORDS[i % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 元素的直接子节点中的译文元素
    pub fn output_children(element: &Handle) -> Vec<Handle> {
        element
            .children
            .borrow()
            .iter()
            .filter(|child| {
                get_node_attr(child, "class").as_deref() == Some(constants::OUTPUT_CLASS)
            })
            .cloned()
            .collect()
    }

    /// 整个文档中的译文元素数量
    pub fn count_outputs(dom: &RcDom) -> usize {
        Self::html(&dom.document)
            .matches(&format!(r#"class="{}""#, constants::OUTPUT_CLASS))
            .count()
    }

    pub fn is_done(element: &Handle) -> bool {
        get_node_attr(element, constants::DONE_ATTR).is_some()
    }

    pub fn body_children(dom: &RcDom, tag: &str) -> Vec<Handle> {
        find_nodes(&dom.document, &["html", "body", tag])
    }
}

/// 包装 `<html><body>…</body></html>`
pub fn page(lang: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html lang="{}"><head><title>t</title></head><body>{}</body></html>"#,
        lang, body
    )
}

/// 等待一段虚拟时间
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
