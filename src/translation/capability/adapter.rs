//! 翻译能力适配
//!
//! 先尝试新版工厂，再尝试旧版接口；都不存在时按固定间隔轮询，直到超过
//! 等待上限。解析成功后结果在会话内复用。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use super::{
    Availability, CapabilityHost, CreateOptions, LegacyAvailability, LegacyTranslationApi,
    TranslatorFactory, TranslatorHandle,
};
use crate::translation::config::constants;
use crate::translation::error::TranslationResult;

/// 解析到的接口形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityShape {
    Modern,
    Legacy,
}

/// 把旧版接口包装成统一的工厂
pub struct LegacyAdapter {
    api: Arc<dyn LegacyTranslationApi>,
}

impl LegacyAdapter {
    pub fn new(api: Arc<dyn LegacyTranslationApi>) -> Self {
        Self { api }
    }

    fn map_availability(legacy: LegacyAvailability) -> Availability {
        match legacy {
            LegacyAvailability::Readily => Availability::Available,
            LegacyAvailability::AfterDownload => Availability::Downloadable,
            LegacyAvailability::No => Availability::Unavailable,
        }
    }
}

impl TranslatorFactory for LegacyAdapter {
    fn availability<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, TranslationResult<Availability>> {
        Box::pin(async move {
            let legacy = self.api.can_translate(source, target).await?;
            Ok(Self::map_availability(legacy))
        })
    }

    fn create(
        &self,
        options: CreateOptions,
    ) -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>> {
        Box::pin(async move {
            // 旧版接口没有下载进度
            self.api
                .create_translator(&options.source, &options.target)
                .await
        })
    }
}

/// 翻译能力解析器
pub struct AdapterResolver {
    host: Arc<dyn CapabilityHost>,
    poll_interval: Duration,
    resolved: Mutex<Option<(CapabilityShape, Arc<dyn TranslatorFactory>)>>,
}

impl AdapterResolver {
    pub fn new(host: Arc<dyn CapabilityHost>) -> Self {
        Self::with_poll_interval(host, constants::ADAPTER_POLL_INTERVAL)
    }

    pub fn with_poll_interval(host: Arc<dyn CapabilityHost>, poll_interval: Duration) -> Self {
        Self {
            host,
            poll_interval,
            resolved: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &Arc<dyn CapabilityHost> {
        &self.host
    }

    fn cached(&self) -> Option<Arc<dyn TranslatorFactory>> {
        self.resolved
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(_, factory)| factory.clone()))
    }

    /// 已解析的接口形态
    pub fn shape(&self) -> Option<CapabilityShape> {
        self.resolved
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(shape, _)| *shape))
    }

    /// 立即尝试解析，不等待
    pub fn try_resolve_now(&self) -> Option<Arc<dyn TranslatorFactory>> {
        if let Some(factory) = self.cached() {
            return Some(factory);
        }

        let (shape, factory): (CapabilityShape, Arc<dyn TranslatorFactory>) =
            if let Some(modern) = self.host.modern_translator() {
                (CapabilityShape::Modern, modern)
            } else if let Some(legacy) = self.host.legacy_translation() {
                (CapabilityShape::Legacy, Arc::new(LegacyAdapter::new(legacy)))
            } else {
                return None;
            };

        tracing::debug!(?shape, "翻译能力已解析");
        if let Ok(mut slot) = self.resolved.lock() {
            *slot = Some((shape, factory.clone()));
        }
        Some(factory)
    }

    /// 在 `max_wait` 内轮询解析翻译能力
    pub async fn resolve(&self, max_wait: Duration) -> Option<Arc<dyn TranslatorFactory>> {
        let deadline = Instant::now() + max_wait;

        loop {
            if let Some(factory) = self.try_resolve_now() {
                return Some(factory);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(wait_ms = max_wait.as_millis() as u64, "等待翻译能力超时");
                return None;
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// 清除已解析的结果
    pub fn reset(&self) {
        if let Ok(mut slot) = self.resolved.lock() {
            *slot = None;
        }
    }
}
