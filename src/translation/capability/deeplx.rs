//! DeepLX 兼容的 HTTP 翻译后端
//!
//! 请求体 `{text, source_lang, target_lang}`，响应 `{code, data, source_lang?}`。
//! 作为新版翻译器工厂接入，也借用同一接口提供语言检测。

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    Availability, CapabilityHost, CreateOptions, DetectionCandidate, LanguageDetectorFactory,
    LanguageDetectorHandle, LegacyTranslationApi, TranslatorFactory, TranslatorHandle,
};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::languages::{from_deeplx_code, to_deeplx_code};

/// 检测语言时最多发送的字符数
const DETECTION_SAMPLE_CHARS: usize = 200;

#[derive(Serialize)]
struct DeeplxRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct DeeplxResponse {
    pub code: u16,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// DeepLX HTTP 客户端
#[derive(Clone)]
pub struct DeeplxClient {
    client: Client,
    api_url: String,
}

impl DeeplxClient {
    pub fn new(api_url: &str, timeout: Duration) -> TranslationResult<Self> {
        let parsed = url::Url::parse(api_url)
            .map_err(|e| helpers::config_error(format!("API 地址无效 '{}': {}", api_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(helpers::config_error(format!(
                "API 地址必须使用 http 或 https: {}",
                api_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// 发送一次翻译请求
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> TranslationResult<DeeplxResponse> {
        let request = DeeplxRequest {
            text,
            source_lang: to_deeplx_code(source),
            target_lang: to_deeplx_code(target),
        };

        let response = self.client.post(&self.api_url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::TranslationServiceError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: DeeplxResponse = response.json().await?;
        if body.code != 200 {
            return Err(TranslationError::TranslationServiceError(format!(
                "DeepLX 返回错误码 {}: {}",
                body.code,
                body.message.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(body)
    }
}

/// 某个语言对的翻译器
pub struct DeeplxTranslator {
    client: DeeplxClient,
    source: String,
    target: String,
}

impl TranslatorHandle for DeeplxTranslator {
    fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
        async move {
            if text.trim().is_empty() {
                return Ok(text);
            }
            let response = self.client.translate(&text, &self.source, &self.target).await?;
            Ok(response.data)
        }
        .boxed()
    }
}

/// 翻译器工厂
pub struct DeeplxFactory {
    client: DeeplxClient,
}

impl TranslatorFactory for DeeplxFactory {
    fn availability<'a>(
        &'a self,
        _source: &'a str,
        _target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Availability>> {
        async { Ok(Availability::Available) }.boxed()
    }

    fn create(
        &self,
        options: CreateOptions,
    ) -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>> {
        async move {
            // 远程后端无需下载模型
            options.monitor.report_loaded(1.0);
            let translator = DeeplxTranslator {
                client: self.client.clone(),
                source: options.source,
                target: options.target,
            };
            Ok(Arc::new(translator) as Arc<dyn TranslatorHandle>)
        }
        .boxed()
    }
}

/// 通过一次自动识别源语言的翻译请求来检测语言
pub struct DeeplxDetector {
    client: DeeplxClient,
}

impl LanguageDetectorHandle for DeeplxDetector {
    fn detect(&self, text: String) -> BoxFuture<'_, TranslationResult<Vec<DetectionCandidate>>> {
        async move {
            let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
            if sample.trim().is_empty() {
                return Ok(Vec::new());
            }
            let response = self.client.translate(&sample, "auto", "en").await?;
            Ok(response
                .source_lang
                .map(|code| DetectionCandidate {
                    language: from_deeplx_code(&code),
                    confidence: 1.0,
                })
                .into_iter()
                .collect())
        }
        .boxed()
    }
}

impl LanguageDetectorFactory for DeeplxFactory {
    fn availability(&self) -> BoxFuture<'_, TranslationResult<Availability>> {
        async { Ok(Availability::Available) }.boxed()
    }

    fn create(&self) -> BoxFuture<'_, TranslationResult<Arc<dyn LanguageDetectorHandle>>> {
        let detector = DeeplxDetector {
            client: self.client.clone(),
        };
        async move { Ok(Arc::new(detector) as Arc<dyn LanguageDetectorHandle>) }.boxed()
    }
}

/// 以 DeepLX 为后端的能力宿主
pub struct DeeplxHost {
    factory: Arc<DeeplxFactory>,
}

impl DeeplxHost {
    pub fn new(api_url: &str, timeout: Duration) -> TranslationResult<Self> {
        Ok(Self {
            factory: Arc::new(DeeplxFactory {
                client: DeeplxClient::new(api_url, timeout)?,
            }),
        })
    }
}

impl CapabilityHost for DeeplxHost {
    fn modern_translator(&self) -> Option<Arc<dyn TranslatorFactory>> {
        Some(self.factory.clone())
    }

    fn legacy_translation(&self) -> Option<Arc<dyn LegacyTranslationApi>> {
        None
    }

    fn language_detector(&self) -> Option<Arc<dyn LanguageDetectorFactory>> {
        Some(self.factory.clone())
    }
}
