//! 会话上下文
//!
//! 一个文档对应一个会话：缓存、翻译器池、语言检测器、就绪记录和能力
//! 解析结果都归会话所有，页面跳转时统一重置。

use std::sync::Arc;

use crate::translation::bridge::{BridgeTransport, PageWindow};
use crate::translation::capability::{AdapterResolver, CapabilityHost, LanguageDetection, TranslatorPool};
use crate::translation::config::TranslationConfig;
use crate::translation::pipeline::LiveTranslation;
use crate::translation::storage::{ExtensionStorage, PairReadinessLedger, TranslationCache};

/// 会话上下文
pub struct SessionContext {
    config: TranslationConfig,
    storage: Arc<ExtensionStorage>,
    cache: TranslationCache,
    pool: TranslatorPool,
    ledger: PairReadinessLedger,
    resolver: AdapterResolver,
    detector: LanguageDetection,
    live: LiveTranslation,
    bridge: Option<BridgeTransport>,
}

impl SessionContext {
    pub fn new(
        host: Arc<dyn CapabilityHost>,
        storage: Arc<ExtensionStorage>,
        config: TranslationConfig,
    ) -> Self {
        let ledger = PairReadinessLedger::new(storage.clone());

        Self {
            pool: TranslatorPool::with_ledger(ledger.clone()),
            resolver: AdapterResolver::with_poll_interval(host.clone(), config.adapter_poll_interval()),
            detector: LanguageDetection::new(host),
            cache: TranslationCache::new(),
            live: LiveTranslation::new(),
            bridge: None,
            ledger,
            storage,
            config,
        }
    }

    /// 能力不可用时经由页面桥接翻译
    pub fn with_bridge(mut self, window: Arc<PageWindow>) -> Self {
        self.bridge = Some(BridgeTransport::with_timeouts(
            window,
            self.config.bridge_timeout(),
            self.config.adapter_wait(),
        ));
        self
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<ExtensionStorage> {
        &self.storage
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn pool(&self) -> &TranslatorPool {
        &self.pool
    }

    pub fn ledger(&self) -> &PairReadinessLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &AdapterResolver {
        &self.resolver
    }

    pub fn detector(&self) -> &LanguageDetection {
        &self.detector
    }

    pub fn live(&self) -> &LiveTranslation {
        &self.live
    }

    pub fn bridge(&self) -> Option<&BridgeTransport> {
        self.bridge.as_ref()
    }

    /// 页面跳转后清空会话状态，持久化的就绪记录保留
    pub fn reset(&self) {
        self.live.cancel_all();
        self.cache.clear();
        self.cache.reset_stats();
        self.pool.clear();
        self.resolver.reset();
        self.detector.reset();
        tracing::debug!("会话已重置");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::capability::StaticCapabilityHost;

    #[test]
    fn test_reset_clears_session_state() {
        let session = SessionContext::new(
            Arc::new(StaticCapabilityHost::new()),
            Arc::new(ExtensionStorage::in_memory()),
            TranslationConfig::default(),
        );
        session.cache().set("a", "en", "fr", "b");
        let reader = session.live().begin();
        let unit = session.live().reader();

        session.reset();

        assert!(session.cache().is_empty());
        assert!(reader.is_cancelled());
        assert!(unit.is_cancelled());
        assert!(!session.live().is_active());
        assert!(session.bridge().is_none());
    }
}
