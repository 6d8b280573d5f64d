//! 键值存储抽象
//!
//! 会话存储只在当前会话有效，本地存储持久化到 JSON 文件。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::translation::error::{helpers, TranslationResult};

/// 异步键值存储
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<Option<Value>>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, TranslationResult<()>>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<()>>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<Option<Value>>> {
        Box::pin(async move {
            let entries = self
                .entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("读取锁失败: {}", e)))?;
            Ok(entries.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, TranslationResult<()>> {
        Box::pin(async move {
            self.entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("写入锁失败: {}", e)))?
                .insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<()>> {
        Box::pin(async move {
            self.entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("写入锁失败: {}", e)))?
                .remove(key);
            Ok(())
        })
    }
}

/// JSON 文件存储，每次写入后整体落盘
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<serde_json::Map<String, Value>>,
}

impl JsonFileStore {
    /// 打开存储文件，不存在时从空表开始
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                serde_json::Map::new()
            } else {
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => map,
                    _ => {
                        return Err(helpers::storage_error(format!(
                            "存储文件不是 JSON 对象: {}",
                            path.display()
                        )))
                    }
                }
            }
        } else {
            serde_json::Map::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "打开本地存储");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &serde_json::Map<String, Value>) -> TranslationResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<Option<Value>>> {
        Box::pin(async move {
            let entries = self
                .entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("读取锁失败: {}", e)))?;
            Ok(entries.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, TranslationResult<()>> {
        Box::pin(async move {
            let mut entries = self
                .entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("写入锁失败: {}", e)))?;
            entries.insert(key.to_string(), value);
            self.flush(&entries)
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TranslationResult<()>> {
        Box::pin(async move {
            let mut entries = self
                .entries
                .lock()
                .map_err(|e| helpers::storage_error(format!("写入锁失败: {}", e)))?;
            if entries.remove(key).is_some() {
                self.flush(&entries)?;
            }
            Ok(())
        })
    }
}

/// 扩展存储：可选的会话区加上必有的本地区
#[derive(Clone)]
pub struct ExtensionStorage {
    session: Option<Arc<dyn KeyValueStore>>,
    local: Arc<dyn KeyValueStore>,
}

impl ExtensionStorage {
    pub fn new(session: Option<Arc<dyn KeyValueStore>>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { session, local }
    }

    /// 全部在内存中的存储，会话区与本地区都可用
    pub fn in_memory() -> Self {
        Self::new(Some(Arc::new(MemoryStore::new())), Arc::new(MemoryStore::new()))
    }

    /// 会话区优先，没有会话区时使用本地区
    pub fn preferred(&self) -> &dyn KeyValueStore {
        match &self.session {
            Some(session) => session.as_ref(),
            None => self.local.as_ref(),
        }
    }

    pub fn session(&self) -> Option<&dyn KeyValueStore> {
        self.session.as_deref()
    }

    pub fn local(&self) -> &dyn KeyValueStore {
        self.local.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
        store.remove("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("nativeTranslate.settings", json!({"targetLanguage": "fr"})).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("nativeTranslate.settings").await.unwrap(),
            Some(json!({"targetLanguage": "fr"}))
        );
    }

    #[test]
    fn test_json_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
    }

    #[tokio::test]
    async fn test_preferred_falls_back_to_local() {
        let local = Arc::new(MemoryStore::new());
        let storage = ExtensionStorage::new(None, local.clone());
        storage.preferred().set("x", json!(1)).await.unwrap();
        assert_eq!(local.len(), 1);
        assert!(storage.session().is_none());
    }
}
