//! 语言对就绪记录
//!
//! 记录哪些 (源语言, 目标语言) 组合已经完成过翻译器初始化，只用于
//! 选择 "正在准备" 还是 "使用已缓存模型" 的提示文案，不会跳过创建翻译器。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::kv::ExtensionStorage;
use crate::translation::config::constants;
use crate::translation::error::TranslationResult;

/// 语言对键
pub fn pair_key(source: &str, target: &str) -> String {
    format!("{}->{}", source, target)
}

/// 语言对就绪记录
#[derive(Clone)]
pub struct PairReadinessLedger {
    storage: Arc<ExtensionStorage>,
}

impl PairReadinessLedger {
    pub fn new(storage: Arc<ExtensionStorage>) -> Self {
        Self { storage }
    }

    async fn read_record(&self) -> TranslationResult<BTreeMap<String, i64>> {
        let value = self
            .storage
            .preferred()
            .get(constants::READY_PAIRS_KEY)
            .await?;

        Ok(match value {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(key, value)| value.as_i64().map(|ts| (key, ts)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    /// 该语言对是否曾经就绪，存储出错时按未就绪处理
    pub async fn was_pair_ready(&self, source: &str, target: &str) -> bool {
        match self.read_record().await {
            Ok(record) => record.contains_key(&pair_key(source, target)),
            Err(e) => {
                tracing::warn!("读取就绪记录失败: {}", e);
                false
            }
        }
    }

    /// 标记语言对就绪，时间戳每次覆盖
    pub async fn mark_pair_ready(&self, source: &str, target: &str) {
        let mut record = match self.read_record().await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("读取就绪记录失败: {}", e);
                BTreeMap::new()
            }
        };

        let now = chrono::Utc::now().timestamp_millis();
        record.insert(pair_key(source, target), now);

        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("序列化就绪记录失败: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .storage
            .preferred()
            .set(constants::READY_PAIRS_KEY, value)
            .await
        {
            tracing::warn!("写入就绪记录失败: {}", e);
        } else {
            tracing::debug!(source, target, "语言对已就绪");
        }
    }

    /// 读取某语言对的就绪时间
    pub async fn ready_since(&self, source: &str, target: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        let record = self.read_record().await.ok()?;
        let millis = *record.get(&pair_key(source, target))?;
        chrono::DateTime::from_timestamp_millis(millis)
    }
}

/// 读取并清除一次性的庆祝标记
pub async fn take_celebration_flag(storage: &ExtensionStorage) -> bool {
    let local = storage.local();
    match local.get(constants::CELEBRATION_KEY).await {
        Ok(Some(value)) if is_truthy(&value) => {
            if let Err(e) = local.remove(constants::CELEBRATION_KEY).await {
                tracing::warn!("清除庆祝标记失败: {}", e);
            }
            true
        }
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("读取庆祝标记失败: {}", e);
            false
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
