//! 翻译能力抽象
//!
//! 宿主环境提供的翻译与语言检测能力都隐藏在 trait 对象之后。宿主可能只
//! 暴露旧版单对象接口，也可能暴露新版命名空间接口，[`adapter`] 负责把两者
//! 统一成 [`TranslatorFactory`]。

pub mod adapter;
#[cfg(feature = "deeplx")]
pub mod deeplx;
pub mod detector;
pub mod pool;

use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

pub use adapter::{AdapterResolver, CapabilityShape, LegacyAdapter};
pub use detector::LanguageDetection;
pub use pool::TranslatorPool;

// ============================================================================
// 可用性与创建参数
// ============================================================================

/// 语言对的可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Unknown,
    Available,
    Downloadable,
    Unavailable,
}

/// 旧版接口的可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyAvailability {
    #[serde(rename = "readily")]
    Readily,
    #[serde(rename = "after-download")]
    AfterDownload,
    #[serde(rename = "no")]
    No,
}

/// 进度回调，参数为 0 到 100 的整数百分比
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// 模型下载进度监视器，只转发变化了的百分比
pub struct ProgressMonitor {
    callback: Option<ProgressCallback>,
    last: Mutex<Option<u8>>,
}

impl ProgressMonitor {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: Mutex::new(None),
        }
    }

    /// 报告已加载比例（0.0 到 1.0）
    pub fn report_loaded(&self, loaded: f64) {
        let fraction = if loaded.is_finite() { loaded } else { 0.0 };
        let percent = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;

        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if *last == Some(percent) {
            return;
        }
        *last = Some(percent);
        drop(last);

        if let Some(callback) = &self.callback {
            callback(percent);
        }
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

/// 创建翻译器的参数
pub struct CreateOptions {
    pub source: String,
    pub target: String,
    pub monitor: Arc<ProgressMonitor>,
}

// ============================================================================
// 流式输出
// ============================================================================

/// 流式翻译产生的片段
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    /// UTF-8 字节，可能在多字节字符中间截断
    Bytes(Vec<u8>),
    /// 带 `text` 字段的对象
    Object(serde_json::Value),
}

/// 可读流的读取端
pub trait ChunkReader: Send {
    /// 读取下一个片段，`None` 表示结束
    fn read(&mut self) -> BoxFuture<'_, TranslationResult<Option<StreamChunk>>>;

    /// 取消读取并释放底层资源
    fn cancel(&mut self) -> BoxFuture<'_, ()>;
}

/// 流式翻译的返回形态
pub enum StreamSource {
    AsyncIterable(BoxStream<'static, TranslationResult<StreamChunk>>),
    Readable(Box<dyn ChunkReader>),
    Array(Vec<StreamChunk>),
    Text(String),
}

// ============================================================================
// 翻译与检测接口
// ============================================================================

/// 已创建的翻译器
pub trait TranslatorHandle: Send + Sync {
    fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>>;

    /// 可选的就绪等待
    fn ready(&self) -> Option<BoxFuture<'_, TranslationResult<()>>> {
        None
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn translate_streaming(&self, _text: String) -> BoxFuture<'_, TranslationResult<StreamSource>> {
        Box::pin(async {
            Err(TranslationError::TranslationServiceError(
                "当前翻译器不支持流式输出".to_string(),
            ))
        })
    }
}

/// 新版翻译器工厂
pub trait TranslatorFactory: Send + Sync {
    fn availability<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Availability>>;

    fn create(&self, options: CreateOptions)
        -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>>;
}

/// 旧版单对象翻译接口
pub trait LegacyTranslationApi: Send + Sync {
    fn can_translate<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<LegacyAvailability>>;

    fn create_translator<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Arc<dyn TranslatorHandle>>>;
}

/// 检测结果候选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    #[serde(rename = "detectedLanguage")]
    pub language: String,
    pub confidence: f64,
}

/// 已创建的语言检测器
pub trait LanguageDetectorHandle: Send + Sync {
    /// 返回按置信度从高到低排列的候选
    fn detect(&self, text: String) -> BoxFuture<'_, TranslationResult<Vec<DetectionCandidate>>>;
}

/// 语言检测器工厂
pub trait LanguageDetectorFactory: Send + Sync {
    fn availability(&self) -> BoxFuture<'_, TranslationResult<Availability>>;

    fn create(&self) -> BoxFuture<'_, TranslationResult<Arc<dyn LanguageDetectorHandle>>>;
}

/// 宿主环境，对应页面或扩展上下文中的全局对象
pub trait CapabilityHost: Send + Sync {
    fn modern_translator(&self) -> Option<Arc<dyn TranslatorFactory>>;

    fn legacy_translation(&self) -> Option<Arc<dyn LegacyTranslationApi>>;

    fn language_detector(&self) -> Option<Arc<dyn LanguageDetectorFactory>>;
}

/// 可以在运行时安装能力的宿主
#[derive(Default)]
pub struct StaticCapabilityHost {
    modern: RwLock<Option<Arc<dyn TranslatorFactory>>>,
    legacy: RwLock<Option<Arc<dyn LegacyTranslationApi>>>,
    detector: RwLock<Option<Arc<dyn LanguageDetectorFactory>>>,
}

impl StaticCapabilityHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modern(self, factory: Arc<dyn TranslatorFactory>) -> Self {
        self.install_modern(factory);
        self
    }

    pub fn with_legacy(self, api: Arc<dyn LegacyTranslationApi>) -> Self {
        self.install_legacy(api);
        self
    }

    pub fn with_detector(self, detector: Arc<dyn LanguageDetectorFactory>) -> Self {
        self.install_detector(detector);
        self
    }

    pub fn install_modern(&self, factory: Arc<dyn TranslatorFactory>) {
        if let Ok(mut slot) = self.modern.write() {
            *slot = Some(factory);
        }
    }

    pub fn install_legacy(&self, api: Arc<dyn LegacyTranslationApi>) {
        if let Ok(mut slot) = self.legacy.write() {
            *slot = Some(api);
        }
    }

    pub fn install_detector(&self, detector: Arc<dyn LanguageDetectorFactory>) {
        if let Ok(mut slot) = self.detector.write() {
            *slot = Some(detector);
        }
    }
}

impl CapabilityHost for StaticCapabilityHost {
    fn modern_translator(&self) -> Option<Arc<dyn TranslatorFactory>> {
        self.modern.read().ok().and_then(|slot| slot.clone())
    }

    fn legacy_translation(&self) -> Option<Arc<dyn LegacyTranslationApi>> {
        self.legacy.read().ok().and_then(|slot| slot.clone())
    }

    fn language_detector(&self) -> Option<Arc<dyn LanguageDetectorFactory>> {
        self.detector.read().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_monitor_dedupes_percent() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let monitor = ProgressMonitor::new(Some(Arc::new(move |p| sink.lock().unwrap().push(p))));

        monitor.report_loaded(0.0);
        monitor.report_loaded(0.001);
        monitor.report_loaded(0.5);
        monitor.report_loaded(0.504);
        monitor.report_loaded(1.7);

        assert_eq!(*calls.lock().unwrap(), vec![0, 50, 100]);
        assert_eq!(monitor.last_percent(), Some(100));
    }

    #[test]
    fn test_progress_monitor_without_callback() {
        let monitor = ProgressMonitor::new(None);
        monitor.report_loaded(f64::NAN);
        assert_eq!(monitor.last_percent(), Some(0));
    }

    #[test]
    fn test_legacy_availability_wire_names() {
        let parsed: LegacyAvailability = serde_json::from_str("\"after-download\"").unwrap();
        assert_eq!(parsed, LegacyAvailability::AfterDownload);
        assert_eq!(
            serde_json::to_string(&Availability::Downloadable).unwrap(),
            "\"downloadable\""
        );
    }

    struct CountingDetector(AtomicUsize);

    impl LanguageDetectorFactory for CountingDetector {
        fn availability(&self) -> BoxFuture<'_, TranslationResult<Availability>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Availability::Unavailable) })
        }

        fn create(&self) -> BoxFuture<'_, TranslationResult<Arc<dyn LanguageDetectorHandle>>> {
            Box::pin(async { Err(TranslationError::CapabilityUnavailable("none".to_string())) })
        }
    }

    #[test]
    fn test_static_host_late_install() {
        let host = StaticCapabilityHost::new();
        assert!(host.language_detector().is_none());
        host.install_detector(Arc::new(CountingDetector(AtomicUsize::new(0))));
        assert!(host.language_detector().is_some());
        assert!(host.modern_translator().is_none());
    }
}
