//! 语言检测
//!
//! 检测器在会话内只创建一次。检测失败时依次回落到文档的 `<html lang>`
//! 和默认语言 `en`。

use std::sync::{Arc, Mutex};

use super::{Availability, CapabilityHost, LanguageDetectorHandle};
use crate::translation::config::constants;
use crate::translation::error::{helpers, TranslationResult};

/// 语言检测服务
pub struct LanguageDetection {
    host: Arc<dyn CapabilityHost>,
    detector: Mutex<Option<Arc<dyn LanguageDetectorHandle>>>,
}

impl LanguageDetection {
    pub fn new(host: Arc<dyn CapabilityHost>) -> Self {
        Self {
            host,
            detector: Mutex::new(None),
        }
    }

    async fn detector(&self) -> TranslationResult<Arc<dyn LanguageDetectorHandle>> {
        if let Some(existing) = self.detector.lock().ok().and_then(|slot| slot.clone()) {
            return Ok(existing);
        }

        let factory = self
            .host
            .language_detector()
            .ok_or_else(|| helpers::capability_error("宿主未提供语言检测能力"))?;

        if factory.availability().await? == Availability::Unavailable {
            return Err(helpers::capability_error("语言检测模型不可用"));
        }

        let handle = factory.create().await?;
        if let Ok(mut slot) = self.detector.lock() {
            *slot = Some(handle.clone());
        }
        Ok(handle)
    }

    /// 检测文本语言，返回最可能的候选
    pub async fn try_detect(&self, text: &str) -> TranslationResult<Option<String>> {
        let detector = self.detector().await?;
        let candidates = detector.detect(text.to_string()).await?;
        Ok(candidates
            .into_iter()
            .map(|candidate| candidate.language)
            .find(|language| !language.trim().is_empty() && language != "und"))
    }

    /// 检测文本语言，失败时使用文档语言或默认语言
    pub async fn detect(&self, text: &str, document_lang: Option<&str>) -> String {
        match self.try_detect(text).await {
            Ok(Some(language)) => return language,
            Ok(None) => tracing::debug!("语言检测无结果，使用回退语言"),
            Err(e) => tracing::debug!("语言检测失败，使用回退语言: {}", e),
        }
        fallback_language(document_lang)
    }

    /// 丢弃已创建的检测器
    pub fn reset(&self) {
        if let Ok(mut slot) = self.detector.lock() {
            *slot = None;
        }
    }
}

/// 文档语言非空时使用文档语言，否则使用默认语言
pub fn fallback_language(document_lang: Option<&str>) -> String {
    document_lang
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(constants::FALLBACK_LANGUAGE)
        .to_string()
}
