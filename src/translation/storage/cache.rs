//! 翻译缓存模块
//!
//! 以 (原文, 源语言, 目标语言) 精确匹配缓存译文，生命周期与会话一致。

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub source: String,
    pub target: String,
}

impl CacheKey {
    pub fn new(text: &str, source: &str, target: &str) -> Self {
        Self {
            text: text.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
}

/// 翻译缓存
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: DashMap<CacheKey, String>,
    hits: AtomicU64,
    misses: AtomicU64,
}

// ============================================================================
// 实现
// ============================================================================

impl TranslationCache {
    /// 创建新的翻译缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取缓存译文，大小写敏感
    pub fn get(&self, text: &str, source: &str, target: &str) -> Option<String> {
        let key = CacheKey::new(text, source, target);
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入缓存，重复写入同一键是幂等的
    pub fn set(&self, text: &str, source: &str, target: &str, translated: &str) {
        self.entries
            .insert(CacheKey::new(text, source, target), translated.to_string());
    }

    /// 检查是否包含指定键（不计入统计）
    pub fn contains(&self, text: &str, source: &str, target: &str) -> bool {
        self.entries.contains_key(&CacheKey::new(text, source, target))
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("翻译缓存已清空");
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            total_requests: hits + misses,
            cache_hits: hits,
            cache_misses: misses,
            total_entries: self.entries.len(),
        }
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// 获取缓存大小
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    /// 计算缓存未命中率
    pub fn miss_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = TranslationCache::new();

        cache.set("hello", "en", "zh-CN", "你好");
        assert_eq!(cache.get("hello", "en", "zh-CN"), Some("你好".to_string()));
        assert_eq!(cache.get("hello", "en", "ja"), None);
        assert_eq!(cache.size(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("hello", "en", "zh-CN"), None);
    }

    #[test]
    fn test_cache_is_case_sensitive() {
        let cache = TranslationCache::new();
        cache.set("Hello", "en", "fr", "Bonjour");
        assert!(cache.get("hello", "en", "fr").is_none());
        assert!(cache.contains("Hello", "en", "fr"));
    }

    #[test]
    fn test_cache_stats() {
        let cache = TranslationCache::new();
        cache.set("hello", "en", "zh-CN", "你好");

        cache.get("hello", "en", "zh-CN");
        cache.get("world", "en", "zh-CN");

        let stats = cache.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);

        cache.reset_stats();
        assert_eq!(cache.get_stats().total_requests, 0);
    }

    #[test]
    fn test_set_is_idempotent() {
        let cache = TranslationCache::new();
        cache.set("a b c", "en", "de", "x");
        cache.set("a b c", "en", "de", "x");
        assert_eq!(cache.size(), 1);
    }
}
