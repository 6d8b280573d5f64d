//! 存储模块
//!
//! 提供译文缓存、键值存储以及语言对就绪记录。

pub mod cache;
pub mod kv;
pub mod readiness;

pub use cache::{CacheKey, CacheStats, TranslationCache};
pub use kv::{ExtensionStorage, JsonFileStore, KeyValueStore, MemoryStore};
pub use readiness::{pair_key, take_celebration_flag, PairReadinessLedger};
