//! 弹窗设置模型与响应式设置存储

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::config::constants;
use super::storage::kv::ExtensionStorage;

/// 悬停翻译的修饰键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyModifier {
    #[default]
    Alt,
    Control,
    Shift,
}

impl HotkeyModifier {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "alt" => Some(Self::Alt),
            "control" | "ctrl" => Some(Self::Control),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alt => "alt",
            Self::Control => "control",
            Self::Shift => "shift",
        }
    }
}

/// 弹窗写入的设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupSettings {
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey_modifier: Option<HotkeyModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_target_language: Option<String>,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),
            hotkey_modifier: None,
            input_target_language: None,
        }
    }
}

impl PopupSettings {
    pub fn hotkey(&self) -> HotkeyModifier {
        self.hotkey_modifier.unwrap_or_default()
    }

    pub fn input_target(&self) -> &str {
        self.input_target_language
            .as_deref()
            .unwrap_or(constants::DEFAULT_INPUT_TARGET_LANGUAGE)
    }
}

/// 设置存储：持久化到本地存储，并通过 watch 通道广播变化
pub struct SettingsStore {
    storage: Arc<ExtensionStorage>,
    sender: watch::Sender<PopupSettings>,
}

impl SettingsStore {
    /// 从本地存储读取当前设置，读取失败时使用默认值
    pub async fn load(storage: Arc<ExtensionStorage>) -> Self {
        let initial = match storage.local().get(constants::SETTINGS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("设置格式无效，使用默认值: {}", e);
                PopupSettings::default()
            }),
            Ok(None) => PopupSettings::default(),
            Err(e) => {
                tracing::warn!("读取设置失败: {}", e);
                PopupSettings::default()
            }
        };

        let (sender, _) = watch::channel(initial);
        Self { storage, sender }
    }

    pub fn current(&self) -> PopupSettings {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PopupSettings> {
        self.sender.subscribe()
    }

    /// 写入新设置并通知订阅者
    pub async fn update(&self, settings: PopupSettings) {
        match serde_json::to_value(&settings) {
            Ok(value) => {
                if let Err(e) = self.storage.local().set(constants::SETTINGS_KEY, value).await {
                    tracing::warn!("保存设置失败: {}", e);
                }
            }
            Err(e) => tracing::warn!("序列化设置失败: {}", e),
        }
        self.sender.send_replace(settings);
    }

    /// 只修改修饰键
    pub async fn update_hotkey(&self, modifier: HotkeyModifier) {
        let mut settings = self.current();
        settings.hotkey_modifier = Some(modifier);
        self.update(settings).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialize_camel_case() {
        let settings = PopupSettings {
            target_language: "fr".to_string(),
            hotkey_modifier: Some(HotkeyModifier::Control),
            input_target_language: Some("de".to_string()),
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "targetLanguage": "fr",
                "hotkeyModifier": "control",
                "inputTargetLanguage": "de"
            })
        );
    }

    #[test]
    fn test_settings_defaults_for_missing_fields() {
        let settings: PopupSettings =
            serde_json::from_value(serde_json::json!({ "targetLanguage": "ja" })).unwrap();
        assert_eq!(settings.hotkey(), HotkeyModifier::Alt);
        assert_eq!(settings.input_target(), "en");
    }

    #[tokio::test]
    async fn test_store_broadcasts_updates() {
        let storage = Arc::new(ExtensionStorage::in_memory());
        let store = SettingsStore::load(storage.clone()).await;
        let mut rx = store.subscribe();

        store.update_hotkey(HotkeyModifier::Shift).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().hotkey(), HotkeyModifier::Shift);

        // 重新加载能读到持久化的值
        let reloaded = SettingsStore::load(storage).await;
        assert_eq!(reloaded.current().hotkey(), HotkeyModifier::Shift);
    }
}
