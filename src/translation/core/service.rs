//! 翻译服务
//!
//! 页面、单个元素和自由文本三种翻译入口都在这里汇合：
//!
//! - **整页**: 预处理 → 扫描 → 检测源语言 → 批次翻译
//! - **单个元素**: 悬停触发，超过 300ms 未完成时显示骨架屏
//! - **文本**: 输入框三连空格与运行时消息使用，带缓存
//!
//! 源语言与目标语言的主语言子标签相同时直接返回，不创建翻译器。本地翻译
//! 能力不可用时改用页面桥接；桥接也失败时结果为空。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc;

use super::session::SessionContext;
use crate::feedback::FeedbackSurface;
use crate::parsers::html::dom::{create_attribute, create_element, get_body, get_node_name};
use crate::parsers::html::gateway::{DocumentGateway, RcDomGateway};
use crate::parsers::html::metadata::get_document_lang;
use crate::translation::capability::{Availability, ProgressCallback, TranslatorHandle};
use crate::translation::config::constants;
use crate::translation::error::{helpers, ErrorCategory, TranslationError, TranslationResult};
use crate::translation::languages::is_same_language;
use crate::translation::pipeline::batch::{insert_translation, BatchOrchestrator, BatchReport};
use crate::translation::pipeline::markers::{extract, strip_markers};
use crate::translation::pipeline::scanner::{
    prepare_document_for_translation, BlockScanner, CaptureKind, TranslationUnit,
};
use crate::translation::pipeline::streaming::{
    translate_line_with_streaming_support, TranslationRoute,
};
use crate::translation::storage::pair_key;

/// 语言检测使用的最大采样长度
const DETECTION_SAMPLE_CHARS: usize = 1000;

/// 整页翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTranslation {
    pub source: String,
    pub target: String,
    pub report: BatchReport,
    /// 源语言与目标语言相同，未翻译
    pub skipped_same_language: bool,
}

/// 文本翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTranslation {
    pub text: String,
    pub detected_source: String,
}

/// 服务统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub pages_translated: AtomicUsize,
    pub units_collected: AtomicUsize,
    pub units_translated: AtomicUsize,
    pub texts_translated: AtomicUsize,
    pub bridge_fallbacks: AtomicUsize,
    pub errors_encountered: AtomicUsize,
    /// 微秒
    pub processing_time: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub pages_translated: usize,
    pub units_collected: usize,
    pub units_translated: usize,
    pub texts_translated: usize,
    pub bridge_fallbacks: usize,
    pub errors_encountered: usize,
    pub processing_time: Duration,
}

impl ServiceStats {
    fn add_time(&self, started: Instant) {
        self.processing_time
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            pages_translated: self.pages_translated.load(Ordering::Relaxed),
            units_collected: self.units_collected.load(Ordering::Relaxed),
            units_translated: self.units_translated.load(Ordering::Relaxed),
            texts_translated: self.texts_translated.load(Ordering::Relaxed),
            bridge_fallbacks: self.bridge_fallbacks.load(Ordering::Relaxed),
            errors_encountered: self.errors_encountered.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 翻译服务
pub struct TranslationService {
    session: SessionContext,
    gateway: Box<dyn DocumentGateway>,
    stats: ServiceStats,
}

impl TranslationService {
    pub fn new(session: SessionContext) -> Self {
        Self::with_gateway(session, Box::new(RcDomGateway::new()))
    }

    pub fn with_gateway(session: SessionContext, gateway: Box<dyn DocumentGateway>) -> Self {
        Self {
            session,
            gateway,
            stats: ServiceStats::default(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn gateway(&self) -> &dyn DocumentGateway {
        self.gateway.as_ref()
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    fn orchestrator(&self) -> BatchOrchestrator<'_> {
        let config = self.session.config();
        BatchOrchestrator::new(self.gateway(), self.session.cache(), self.session.live())
            .with_batch_size(config.batch_size)
            .with_streaming_threshold(config.streaming_threshold)
    }

    // ========================================================================
    // 翻译器与翻译途径
    // ========================================================================

    /// 获取本地翻译器，必要时等待能力就绪并创建
    pub async fn local_translator(
        &self,
        source: &str,
        target: &str,
        surface: Option<&dyn FeedbackSurface>,
    ) -> TranslationResult<Arc<dyn TranslatorHandle>> {
        let pool = self.session.pool();
        if let Some(existing) = pool.get(source, target) {
            return Ok(existing);
        }

        let factory = self
            .session
            .resolver()
            .resolve(self.session.config().adapter_wait())
            .await
            .ok_or_else(|| helpers::capability_error("当前环境没有可用的翻译能力"))?;

        match factory.availability(source, target).await {
            Ok(Availability::Unavailable) => {
                return Err(helpers::capability_error(format!(
                    "不支持的语言对 {}",
                    pair_key(source, target)
                )));
            }
            Ok(availability) => tracing::debug!(?availability, source, target, "语言对可用性"),
            Err(e) => tracing::debug!(error = %e, "无法查询语言对可用性"),
        }

        if let Some(surface) = surface {
            if self.session.ledger().was_pair_ready(source, target).await {
                surface.show("使用已缓存的翻译模型");
            } else {
                surface.show("正在准备翻译模型…");
            }
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let on_progress: ProgressCallback = Arc::new(move |percent| {
            let _ = progress_tx.send(percent);
        });

        let create = pool.create_translator(factory.as_ref(), source, target, Some(on_progress));
        tokio::pin!(create);

        loop {
            tokio::select! {
                result = &mut create => return result,
                Some(percent) = progress_rx.recv() => {
                    if let Some(surface) = surface {
                        surface.show(&format!("正在下载翻译模型 {}%", percent));
                    }
                }
            }
        }
    }

    /// 选择翻译途径：本地翻译器优先，其次页面桥接
    async fn route_for<'a>(
        &'a self,
        document: Option<&Handle>,
        source: &'a str,
        target: &'a str,
        surface: Option<&dyn FeedbackSurface>,
    ) -> TranslationRoute<'a> {
        let error = match self.local_translator(source, target, surface).await {
            Ok(handle) => return TranslationRoute::Local(handle),
            Err(e) => e,
        };

        helpers::trace_error(&error);

        let Some(bridge) = self.session.bridge() else {
            return TranslationRoute::Unavailable;
        };

        match document {
            Some(document) => {
                bridge.ensure_bridge(document);
            }
            None if !bridge.window().bridge_installed() => return TranslationRoute::Unavailable,
            None => {}
        }

        self.stats.bridge_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::info!(source, target, "本地翻译能力不可用，改用页面桥接");
        TranslationRoute::Bridge {
            transport: bridge,
            source,
            target,
        }
    }

    /// 检测源语言，失败时依次使用文档语言和默认语言
    pub async fn detect_source(&self, text: &str, document: Option<&Handle>) -> String {
        let document_lang = document.and_then(get_document_lang);
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
        self.session
            .detector()
            .detect(&sample, document_lang.as_deref())
            .await
    }

    // ========================================================================
    // 整页
    // ========================================================================

    /// 翻译整个页面
    pub async fn translate_page(
        &self,
        document: &Handle,
        target: &str,
        surface: &dyn FeedbackSurface,
    ) -> TranslationResult<PageTranslation> {
        let started = Instant::now();
        let root = get_body(document).unwrap_or_else(|| document.clone());

        prepare_document_for_translation(&root);
        let units = BlockScanner::new(self.gateway()).collect_translatable_blocks(&root);
        self.stats
            .units_collected
            .fetch_add(units.len(), Ordering::Relaxed);

        if units.is_empty() {
            surface.show("没有需要翻译的内容");
            return Ok(PageTranslation {
                source: String::new(),
                target: target.to_string(),
                report: BatchReport::default(),
                skipped_same_language: false,
            });
        }

        let sample = units
            .iter()
            .map(|unit| strip_markers(&unit.text))
            .collect::<Vec<_>>()
            .join("\n");
        let source = self.detect_source(&sample, Some(document)).await;

        if is_same_language(&source, target) {
            tracing::info!(source = %source, target, "页面已是目标语言");
            surface.show("页面已是目标语言");
            return Ok(PageTranslation {
                source,
                target: target.to_string(),
                report: BatchReport {
                    total: units.len(),
                    ..BatchReport::default()
                },
                skipped_same_language: true,
            });
        }

        let route = self
            .route_for(Some(document), &source, target, Some(surface))
            .await;
        if matches!(route, TranslationRoute::Unavailable) {
            surface.show("翻译能力不可用");
        }

        let report = self
            .orchestrator()
            .translate_blocks_sequentially(units, &route, &source, target, &mut |done, total| {
                let percent = done * 100 / total.max(1);
                surface.show(&format!("翻译中 {}/{} ({}%)", done, total, percent));
            })
            .await;

        if report.translated > 0 {
            surface.show("翻译完成");
        } else if report.total > 0 {
            surface.show("翻译失败，未能生成译文");
        }

        self.stats.pages_translated.fetch_add(1, Ordering::Relaxed);
        self.stats
            .units_translated
            .fetch_add(report.translated, Ordering::Relaxed);
        self.stats.add_time(started);

        Ok(PageTranslation {
            source,
            target: target.to_string(),
            report,
            skipped_same_language: false,
        })
    }

    // ========================================================================
    // 单个元素
    // ========================================================================

    /// 翻译单个元素，翻译超过骨架屏延迟时显示占位
    ///
    /// 返回是否写入了译文。
    pub async fn translate_element_on_demand(
        &self,
        document: &Handle,
        element: &Handle,
        target: &str,
        surface: Option<&dyn FeedbackSurface>,
    ) -> TranslationResult<bool> {
        if !self.gateway.is_attached(element) {
            return Ok(false);
        }

        let extraction = extract(element);
        if extraction.text.trim().is_empty() {
            return Ok(false);
        }

        let source = self
            .detect_source(&strip_markers(&extraction.text), Some(document))
            .await;
        if is_same_language(&source, target) {
            tracing::debug!(source = %source, target, "元素已是目标语言");
            return Ok(false);
        }

        let kind = match get_node_name(element) {
            Some(tag) if constants::LEAF_INLINE_TAGS.contains(&tag) => CaptureKind::InlineLeaf,
            _ => CaptureKind::Block,
        };
        let unit = TranslationUnit {
            element: element.clone(),
            text: extraction.text,
            node_map: extraction.node_map,
            kind,
        };

        let skeleton_unit = unit.clone();
        let work = async {
            let route = self.route_for(Some(document), &source, target, surface).await;
            self.orchestrator()
                .translate_blocks_sequentially(vec![unit], &route, &source, target, &mut |_, _| {})
                .await
        };
        tokio::pin!(work);

        let mut skeleton = None;
        let report = tokio::select! {
            report = &mut work => report,
            _ = tokio::time::sleep(self.session.config().skeleton_delay()) => {
                let placeholder = create_skeleton();
                if insert_translation(self.gateway(), &skeleton_unit, placeholder.clone()) {
                    skeleton = Some(placeholder);
                }
                work.await
            }
        };

        if let Some(placeholder) = skeleton {
            self.gateway.remove(&placeholder);
        }

        self.stats
            .units_translated
            .fetch_add(report.translated, Ordering::Relaxed);
        Ok(report.translated > 0)
    }

    // ========================================================================
    // 文本
    // ========================================================================

    /// 翻译一段文本；`source` 为空或 `auto` 时自动检测
    pub async fn translate_text(
        &self,
        document: Option<&Handle>,
        text: &str,
        source: Option<&str>,
        target: &str,
        surface: Option<&dyn FeedbackSurface>,
    ) -> TranslationResult<TextTranslation> {
        let source = match source {
            Some(source) if !source.is_empty() && source != constants::AUTO_SOURCE_LANGUAGE => {
                source.to_string()
            }
            _ => self.detect_source(text, document).await,
        };

        if text.trim().is_empty() || is_same_language(&source, target) {
            return Ok(TextTranslation {
                text: text.to_string(),
                detected_source: source,
            });
        }

        let cache = self.session.cache();
        if let Some(cached) = cache.get(text, &source, target) {
            return Ok(TextTranslation {
                text: cached,
                detected_source: source,
            });
        }

        let route = self.route_for(document, &source, target, surface).await;
        let translated = match route.translate(text).await {
            Ok(translated) => translated,
            Err(e) => {
                return Ok(TextTranslation {
                    text: self.recover_backend_failure(e)?,
                    detected_source: source,
                })
            }
        };

        if !translated.trim().is_empty() {
            cache.set(text, &source, target, &translated);
        }
        self.stats.texts_translated.fetch_add(1, Ordering::Relaxed);

        Ok(TextTranslation {
            text: translated,
            detected_source: source,
        })
    }

    /// 实时输出的文本翻译
    ///
    /// 同一时间只有一路实时输出：新的调用会取消仍在读取的旧调用，被取消的
    /// 调用返回 `None`。流式片段依次交给 `sink`；没有走流式时完整译文只交给
    /// `sink` 一次。
    pub async fn translate_text_live(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
        sink: &mut (dyn FnMut(&str) + '_),
    ) -> TranslationResult<Option<TextTranslation>> {
        let live = self.session.live();
        let reader = live.begin();

        let source = match source {
            Some(source) if !source.is_empty() && source != constants::AUTO_SOURCE_LANGUAGE => {
                source.to_string()
            }
            _ => self.detect_source(text, None).await,
        };

        if text.trim().is_empty() || is_same_language(&source, target) {
            live.finish(&reader);
            sink(text);
            return Ok(Some(TextTranslation {
                text: text.to_string(),
                detected_source: source,
            }));
        }

        let cache = self.session.cache();
        if let Some(cached) = cache.get(text, &source, target) {
            live.finish(&reader);
            sink(&cached);
            return Ok(Some(TextTranslation {
                text: cached,
                detected_source: source,
            }));
        }

        let route = self.route_for(None, &source, target, None).await;
        let outcome = translate_line_with_streaming_support(
            &route,
            text,
            self.session.config().streaming_threshold,
            sink,
            Some(&reader),
        )
        .await;
        live.finish(&reader);

        let translated = match outcome {
            Ok(result) if result.cancelled => {
                tracing::debug!(source = %source, target, "实时翻译被新的请求取消");
                return Ok(None);
            }
            Ok(result) => {
                if !result.streamed {
                    sink(&result.text);
                }
                result.text
            }
            Err(e) => {
                let text = self.recover_backend_failure(e)?;
                sink(&text);
                return Ok(Some(TextTranslation {
                    text,
                    detected_source: source,
                }));
            }
        };

        if !translated.trim().is_empty() {
            cache.set(text, &source, target, &translated);
        }
        self.stats.texts_translated.fetch_add(1, Ordering::Relaxed);

        Ok(Some(TextTranslation {
            text: translated,
            detected_source: source,
        }))
    }

    /// 本地能力与桥接都失败时译文为空，其余错误继续上抛
    fn recover_backend_failure(&self, error: TranslationError) -> TranslationResult<String> {
        self.stats.errors_encountered.fetch_add(1, Ordering::Relaxed);
        match error.category() {
            ErrorCategory::Capability | ErrorCategory::Bridge => {
                helpers::trace_error(&error);
                Ok(String::new())
            }
            _ => helpers::log_error(error),
        }
    }

    /// 提前创建语言对的翻译器
    pub async fn prewarm(&self, source: &str, target: &str) -> TranslationResult<()> {
        if source.is_empty() || source == constants::AUTO_SOURCE_LANGUAGE {
            return Err(TranslationError::InvalidInput(
                "预热需要明确的源语言".to_string(),
            ));
        }
        if is_same_language(source, target) {
            return Ok(());
        }

        self.local_translator(source, target, None).await?;
        tracing::debug!(source, target, "翻译器已预热");
        Ok(())
    }
}

/// 骨架屏占位元素
fn create_skeleton() -> Handle {
    create_element(
        "span",
        vec![
            create_attribute("class", constants::SKELETON_CLASS),
            create_attribute(constants::OUTPUT_ATTR, "1"),
            create_attribute("aria-hidden", "true"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::capability::{
        CreateOptions, DetectionCandidate, LanguageDetectorFactory, LanguageDetectorHandle,
        StaticCapabilityHost, TranslatorFactory,
    };
    use crate::translation::config::TranslationConfig;
    use crate::translation::storage::ExtensionStorage;
    use futures::future::BoxFuture;

    struct Prefix;

    impl TranslatorHandle for Prefix {
        fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
            Box::pin(async move { Ok(format!("fr:{}", text)) })
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl TranslatorFactory for CountingFactory {
        fn availability<'a>(
            &'a self,
            _source: &'a str,
            _target: &'a str,
        ) -> BoxFuture<'a, TranslationResult<Availability>> {
            Box::pin(async { Ok(Availability::Available) })
        }

        fn create(
            &self,
            options: CreateOptions,
        ) -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            options.monitor.report_loaded(1.0);
            Box::pin(async { Ok(Arc::new(Prefix) as Arc<dyn TranslatorHandle>) })
        }
    }

    struct English;

    impl LanguageDetectorHandle for English {
        fn detect(&self, _text: String) -> BoxFuture<'_, TranslationResult<Vec<DetectionCandidate>>> {
            Box::pin(async {
                Ok(vec![DetectionCandidate {
                    language: "en".to_string(),
                    confidence: 0.9,
                }])
            })
        }
    }

    struct EnglishFactory;

    impl LanguageDetectorFactory for EnglishFactory {
        fn availability(&self) -> BoxFuture<'_, TranslationResult<Availability>> {
            Box::pin(async { Ok(Availability::Available) })
        }

        fn create(&self) -> BoxFuture<'_, TranslationResult<Arc<dyn LanguageDetectorHandle>>> {
            Box::pin(async { Ok(Arc::new(English) as Arc<dyn LanguageDetectorHandle>) })
        }
    }

    fn service(factory: Arc<CountingFactory>) -> TranslationService {
        let host = StaticCapabilityHost::new()
            .with_modern(factory)
            .with_detector(Arc::new(EnglishFactory));
        TranslationService::new(SessionContext::new(
            Arc::new(host),
            Arc::new(ExtensionStorage::in_memory()),
            TranslationConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_translate_text_uses_cache() {
        let factory = Arc::new(CountingFactory::default());
        let service = service(factory.clone());

        let first = service
            .translate_text(None, "Hello", None, "fr", None)
            .await
            .unwrap();
        assert_eq!(first.text, "fr:Hello");
        assert_eq!(first.detected_source, "en");

        let second = service
            .translate_text(None, "Hello", Some("en"), "fr", None)
            .await
            .unwrap();
        assert_eq!(second.text, "fr:Hello");
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(service.session().cache().get_stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_same_language_short_circuit() {
        let factory = Arc::new(CountingFactory::default());
        let service = service(factory.clone());

        let result = service
            .translate_text(None, "Hello", Some("en"), "en-US", None)
            .await
            .unwrap();
        assert_eq!(result.text, "Hello");
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
        assert!(service.session().pool().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_capability_without_bridge_gives_empty_text() {
        let service = TranslationService::new(SessionContext::new(
            Arc::new(StaticCapabilityHost::new()),
            Arc::new(ExtensionStorage::in_memory()),
            TranslationConfig::default(),
        ));

        let translation = service
            .translate_text(None, "Hello", Some("en"), "fr", None)
            .await
            .unwrap();
        assert_eq!(translation.text, "");
        assert_eq!(translation.detected_source, "en");
        assert_eq!(service.stats().errors_encountered, 1);
        assert_eq!(service.stats().texts_translated, 0);
        assert!(service.session().cache().get("Hello", "en", "fr").is_none());
    }

    #[tokio::test]
    async fn test_prewarm_requires_explicit_source() {
        let factory = Arc::new(CountingFactory::default());
        let service = service(factory.clone());

        assert!(service.prewarm("auto", "fr").await.is_err());
        service.prewarm("en", "fr").await.unwrap();
        assert_eq!(service.session().pool().len(), 1);
        assert!(service.session().ledger().was_pair_ready("en", "fr").await);
    }
}
