//! 配置管理器
//!
//! 加载顺序：内置默认值 → 配置文件（`config` crate，TOML）→ `.env` →
//! `NATIVE_TRANSLATE_*` 环境变量 → `validate()`。

use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::settings::HotkeyModifier;

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 语言
    pub target_language: String,
    pub input_target_language: String,
    pub source_language: String,
    pub hotkey_modifier: HotkeyModifier,

    // 后端
    pub api_url: String,
    pub request_timeout_secs: u64,

    // 批次
    pub batch_size: usize,
    pub streaming_threshold: usize,

    // 计时（毫秒）
    pub adapter_wait_ms: u64,
    pub adapter_poll_ms: u64,
    pub bridge_timeout_ms: u64,
    pub skeleton_delay_ms: u64,
    pub hint_delay_ms: u64,
    pub exit_animation_ms: u64,

    // 存储
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),
            input_target_language: constants::DEFAULT_INPUT_TARGET_LANGUAGE.to_string(),
            source_language: constants::AUTO_SOURCE_LANGUAGE.to_string(),
            hotkey_modifier: HotkeyModifier::default(),

            api_url: constants::DEFAULT_API_URL.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            batch_size: constants::BATCH_SIZE,
            streaming_threshold: constants::STREAMING_LENGTH_THRESHOLD,

            adapter_wait_ms: constants::DEFAULT_ADAPTER_WAIT.as_millis() as u64,
            adapter_poll_ms: constants::ADAPTER_POLL_INTERVAL.as_millis() as u64,
            bridge_timeout_ms: constants::BRIDGE_TIMEOUT.as_millis() as u64,
            skeleton_delay_ms: constants::SKELETON_DELAY.as_millis() as u64,
            hint_delay_ms: constants::HINT_DELAY.as_millis() as u64,
            exit_animation_ms: constants::EXIT_ANIMATION.as_millis() as u64,

            store_path: None,
        }
    }
}

impl TranslationConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.streaming_threshold == 0 {
            return Err(TranslationError::ConfigError("流式阈值不能为0".to_string()));
        }

        if self.target_language.trim().is_empty() || self.target_language == "auto" {
            return Err(TranslationError::ConfigError(format!(
                "目标语言无效: '{}'",
                self.target_language
            )));
        }

        if self.input_target_language.trim().is_empty() || self.input_target_language == "auto" {
            return Err(TranslationError::ConfigError(format!(
                "输入目标语言无效: '{}'",
                self.input_target_language
            )));
        }

        if self.adapter_poll_ms == 0 {
            return Err(TranslationError::ConfigError("轮询间隔不能为0".to_string()));
        }

        if self.bridge_timeout_ms == 0 {
            return Err(TranslationError::ConfigError("桥接超时不能为0".to_string()));
        }

        match url::Url::parse(&self.api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(TranslationError::ConfigError(format!(
                    "API 地址无效: '{}'",
                    self.api_url
                )))
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖，只处理显式设置的变量
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{storage, translation, EnvVar};

        fn apply<T>(name: &str, found: Option<crate::env::EnvResult<T>>, slot: &mut T) {
            match found {
                Some(Ok(value)) => *slot = value,
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量 {}: {}", name, e),
                None => {}
            }
        }

        apply(
            translation::TargetLanguage::NAME,
            translation::TargetLanguage::lookup(),
            &mut self.target_language,
        );
        apply(
            translation::InputTargetLanguage::NAME,
            translation::InputTargetLanguage::lookup(),
            &mut self.input_target_language,
        );
        apply(
            translation::SourceLanguage::NAME,
            translation::SourceLanguage::lookup(),
            &mut self.source_language,
        );
        apply(
            translation::ApiUrl::NAME,
            translation::ApiUrl::lookup(),
            &mut self.api_url,
        );
        apply(
            translation::BatchSize::NAME,
            translation::BatchSize::lookup(),
            &mut self.batch_size,
        );
        apply(
            translation::StreamingThreshold::NAME,
            translation::StreamingThreshold::lookup(),
            &mut self.streaming_threshold,
        );

        if let Some(found) = translation::HotkeyModifier::lookup() {
            match found.map(|value| HotkeyModifier::parse(&value)) {
                Ok(Some(modifier)) => self.hotkey_modifier = modifier,
                Ok(None) => {}
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        let mut adapter_wait = self.adapter_wait();
        apply(
            translation::AdapterWait::NAME,
            translation::AdapterWait::lookup(),
            &mut adapter_wait,
        );
        self.adapter_wait_ms = adapter_wait.as_millis() as u64;

        let mut bridge_timeout = self.bridge_timeout();
        apply(
            translation::BridgeTimeout::NAME,
            translation::BridgeTimeout::lookup(),
            &mut bridge_timeout,
        );
        self.bridge_timeout_ms = bridge_timeout.as_millis() as u64;

        if let Some(found) = storage::StorePath::lookup() {
            match found {
                Ok(path) => self.store_path = Some(path),
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }
    }

    /// 转换为Duration类型
    pub fn adapter_wait(&self) -> Duration {
        Duration::from_millis(self.adapter_wait_ms)
    }

    pub fn adapter_poll_interval(&self) -> Duration {
        Duration::from_millis(self.adapter_poll_ms)
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_timeout_ms)
    }

    pub fn skeleton_delay(&self) -> Duration {
        Duration::from_millis(self.skeleton_delay_ms)
    }

    pub fn hint_delay(&self) -> Duration {
        Duration::from_millis(self.hint_delay_ms)
    }

    pub fn exit_animation(&self) -> Duration {
        Duration::from_millis(self.exit_animation_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
    source_path: Option<String>,
}

impl ConfigManager {
    /// 按默认搜索路径创建配置管理器
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let source_path = constants::CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).to_string())
            .find(|path| Path::new(path).exists());

        Self::build(source_path)
    }

    /// 从指定文件创建配置管理器
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TranslationError::ConfigError(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }
        Self::load_dotenv();
        Self::build(Some(path.to_string_lossy().to_string()))
    }

    fn build(source_path: Option<String>) -> TranslationResult<Self> {
        let mut config = match &source_path {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path);
                Self::load_from_file(path)?
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                TranslationConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        tracing::debug!(
            target_language = %config.target_language,
            api_url = %config.api_url,
            batch_size = config.batch_size,
            "配置加载完成"
        );

        Ok(Self {
            config,
            source_path,
        })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 配置来源文件
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// 从指定文件加载配置，缺失的字段取默认值
    fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let defaults = Config::try_from(&TranslationConfig::default())?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::new(path, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&TranslationConfig::default())
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.streaming_threshold, 500);
        assert_eq!(config.bridge_timeout(), Duration::from_secs(10));
        assert_eq!(config.hotkey_modifier, HotkeyModifier::Alt);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TranslationConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.target_language = "auto".to_string();
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.api_url = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "target_language = \"ja\"").unwrap();
        writeln!(file, "hotkey_modifier = \"shift\"").unwrap();
        writeln!(file, "batch_size = 5").unwrap();

        let config = ConfigManager::load_from_file(&file.path().to_string_lossy()).unwrap();
        assert_eq!(config.target_language, "ja");
        assert_eq!(config.hotkey_modifier, HotkeyModifier::Shift);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.streaming_threshold, 500);
    }

    #[test]
    fn test_generate_example_config_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        ConfigManager::generate_example_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: TranslationConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, TranslationConfig::default());
    }
}
