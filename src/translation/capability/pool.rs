//! 翻译器池
//!
//! 每个 (源语言, 目标语言) 组合在会话内只保留一个翻译器，按需创建，从不淘汰。
//! 查找与创建之间不加锁，并发时可能为同一语言对创建两个翻译器，后写入者覆盖。

use std::sync::Arc;

use dashmap::DashMap;

use super::{CreateOptions, ProgressCallback, ProgressMonitor, TranslatorFactory, TranslatorHandle};
use crate::translation::error::TranslationResult;
use crate::translation::storage::PairReadinessLedger;

type PairKey = (String, String);

/// 翻译器池
#[derive(Default)]
pub struct TranslatorPool {
    entries: DashMap<PairKey, Arc<dyn TranslatorHandle>>,
    ledger: Option<PairReadinessLedger>,
}

impl TranslatorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建成功后把语言对写入就绪记录
    pub fn with_ledger(ledger: PairReadinessLedger) -> Self {
        Self {
            entries: DashMap::new(),
            ledger: Some(ledger),
        }
    }

    /// 查找已创建的翻译器
    pub fn get(&self, source: &str, target: &str) -> Option<Arc<dyn TranslatorHandle>> {
        self.entries
            .get(&(source.to_string(), target.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// 获取或创建翻译器
    pub async fn create_translator(
        &self,
        factory: &dyn TranslatorFactory,
        source: &str,
        target: &str,
        on_progress: Option<ProgressCallback>,
    ) -> TranslationResult<Arc<dyn TranslatorHandle>> {
        if let Some(existing) = self.get(source, target) {
            return Ok(existing);
        }

        tracing::debug!(source, target, "创建翻译器");

        let monitor = Arc::new(ProgressMonitor::new(on_progress));
        let handle = factory
            .create(CreateOptions {
                source: source.to_string(),
                target: target.to_string(),
                monitor,
            })
            .await?;

        if let Some(ready) = handle.ready() {
            ready.await?;
        }

        self.entries
            .insert((source.to_string(), target.to_string()), handle.clone());

        if let Some(ledger) = &self.ledger {
            ledger.mark_pair_ready(source, target).await;
        }

        tracing::info!(source, target, pool_size = self.entries.len(), "翻译器就绪");
        Ok(handle)
    }

    /// 池中翻译器数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::capability::Availability;
    use crate::translation::storage::ExtensionStorage;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Upper;

    impl TranslatorHandle for Upper {
        fn translate(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
            Box::pin(async move { Ok(text.to_uppercase()) })
        }

        fn ready(&self) -> Option<BoxFuture<'_, TranslationResult<()>>> {
            Some(Box::pin(async { Ok(()) }))
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        creates: AtomicUsize,
    }

    impl TranslatorFactory for CountingFactory {
        fn availability<'a>(
            &'a self,
            _source: &'a str,
            _target: &'a str,
        ) -> BoxFuture<'a, TranslationResult<Availability>> {
            Box::pin(async { Ok(Availability::Downloadable) })
        }

        fn create(
            &self,
            options: CreateOptions,
        ) -> BoxFuture<'_, TranslationResult<Arc<dyn TranslatorHandle>>> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                options.monitor.report_loaded(0.25);
                options.monitor.report_loaded(0.25);
                options.monitor.report_loaded(1.0);
                Ok(Arc::new(Upper) as Arc<dyn TranslatorHandle>)
            })
        }
    }

    #[tokio::test]
    async fn test_pool_reuses_translator_per_pair() {
        let pool = TranslatorPool::new();
        let factory = CountingFactory::default();

        let a = pool.create_translator(&factory, "en", "fr", None).await.unwrap();
        let b = pool.create_translator(&factory, "en", "fr", None).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.creates.load(Ordering::SeqCst), 1);

        pool.create_translator(&factory, "en", "de", None).await.unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_pool_forwards_deduped_progress_and_marks_ready() {
        let storage = Arc::new(ExtensionStorage::in_memory());
        let ledger = PairReadinessLedger::new(storage);
        let pool = TranslatorPool::with_ledger(ledger.clone());
        let factory = CountingFactory::default();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));

        pool.create_translator(&factory, "en", "ja", Some(callback))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![25, 100]);
        assert!(ledger.was_pair_ready("en", "ja").await);
    }
}
