//! 运行时消息协议
//!
//! 弹窗、侧边栏与页面脚本之间的消息格式：`{type, payload}`，字段名为驼峰式。

use serde::{Deserialize, Serialize};

use super::error::{TranslationError, TranslationResult};
use super::settings::HotkeyModifier;

/// 页面脚本接收的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RuntimeMessage {
    /// 翻译整个页面
    #[serde(rename = "NATIVE_TRANSLATE_TRANSLATE_PAGE", rename_all = "camelCase")]
    TranslatePage { target_language: String },

    #[serde(rename = "NATIVE_TRANSLATE_UPDATE_HOTKEY", rename_all = "camelCase")]
    UpdateHotkey { hotkey_modifier: HotkeyModifier },

    /// 翻译一段文本，源语言为 `auto` 或缺省时自动检测
    #[serde(rename = "NATIVE_TRANSLATE_TRANSLATE_TEXT", rename_all = "camelCase")]
    TranslateText {
        text: String,
        #[serde(default)]
        source_language: Option<String>,
        target_language: String,
    },

    /// 提前创建翻译器
    #[serde(rename = "NATIVE_TRANSLATE_PREWARM", rename_all = "camelCase")]
    Prewarm {
        source_language: String,
        target_language: String,
    },

    #[serde(rename = "NATIVE_TRANSLATE_PING")]
    Ping,
}

impl RuntimeMessage {
    pub fn from_json(raw: &str) -> TranslationResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            TranslationError::InvalidInput(format!("无法识别的运行时消息: {}", e))
        })
    }

    pub fn to_json(&self) -> TranslationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 消息类型名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TranslatePage { .. } => "NATIVE_TRANSLATE_TRANSLATE_PAGE",
            Self::UpdateHotkey { .. } => "NATIVE_TRANSLATE_UPDATE_HOTKEY",
            Self::TranslateText { .. } => "NATIVE_TRANSLATE_TRANSLATE_TEXT",
            Self::Prewarm { .. } => "NATIVE_TRANSLATE_PREWARM",
            Self::Ping => "NATIVE_TRANSLATE_PING",
        }
    }

    /// 发送方是否等待应答
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::TranslateText { .. } | Self::Ping)
    }
}

/// 消息应答
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    pub fn success(result: impl Into<String>, detected_source: Option<String>) -> Self {
        Self {
            ok: true,
            result: Some(result.into()),
            detected_source,
            error: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn failure(error: &TranslationError) -> Self {
        Self {
            ok: false,
            error: Some(error.message().to_string()),
            ..Self::default()
        }
    }
}
