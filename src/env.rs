//! 统一的环境变量管理系统
//!
//! 所有 `NATIVE_TRANSLATE_*` 变量都通过 [`EnvVar`] 访问，解析失败时给出
//! 带变量名的错误，未设置时回落到声明的默认值。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 未设置时的默认值，`None` 表示必须显式设置
    fn default_value() -> Option<T> {
        None
    }

    /// 只在变量被显式设置时返回解析结果
    fn lookup() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get() -> EnvResult<T> {
        match Self::lookup() {
            Some(result) => result,
            None => Self::default_value().ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "NATIVE_TRANSLATE_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn default_value() -> Option<String> {
            Some("info".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 页面翻译目标语言
    pub struct TargetLanguage;
    impl EnvVar<String> for TargetLanguage {
        const NAME: &'static str = "NATIVE_TRANSLATE_TARGET_LANGUAGE";
        const DESCRIPTION: &'static str = "Target language for page translation (BCP 47 tag)";

        fn default_value() -> Option<String> {
            Some("zh-CN".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_language_tag(value, Self::NAME, false)
        }
    }

    /// 输入框三连空格翻译的目标语言
    pub struct InputTargetLanguage;
    impl EnvVar<String> for InputTargetLanguage {
        const NAME: &'static str = "NATIVE_TRANSLATE_INPUT_TARGET_LANGUAGE";
        const DESCRIPTION: &'static str = "Target language for triple-space input translation";

        fn default_value() -> Option<String> {
            Some("en".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_language_tag(value, Self::NAME, false)
        }
    }

    /// 源语言
    pub struct SourceLanguage;
    impl EnvVar<String> for SourceLanguage {
        const NAME: &'static str = "NATIVE_TRANSLATE_SOURCE_LANGUAGE";
        const DESCRIPTION: &'static str = "Source language ('auto' for detection)";

        fn default_value() -> Option<String> {
            Some("auto".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_language_tag(value, Self::NAME, true)
        }
    }

    /// 悬停翻译的修饰键
    pub struct HotkeyModifier;
    impl EnvVar<String> for HotkeyModifier {
        const NAME: &'static str = "NATIVE_TRANSLATE_HOTKEY_MODIFIER";
        const DESCRIPTION: &'static str = "Hover translation modifier: alt, control, shift";

        fn default_value() -> Option<String> {
            Some("alt".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                modifier @ ("alt" | "control" | "shift") => Ok(modifier.to_string()),
                "ctrl" => Ok("control".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid modifier '{}'. Use: alt, control, shift", value),
                }),
            }
        }
    }

    /// DeepLX 兼容接口地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "NATIVE_TRANSLATE_API_URL";
        const DESCRIPTION: &'static str = "DeepLX-compatible translation endpoint URL";

        fn default_value() -> Option<String> {
            Some("http://localhost:1188/translate".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            match url::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must be an absolute http:// or https:// URL".to_string(),
                }),
            }
        }
    }

    /// 每批处理的翻译单元数
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "NATIVE_TRANSLATE_BATCH_SIZE";
        const DESCRIPTION: &'static str = "Translation units processed per batch";

        fn default_value() -> Option<usize> {
            Some(20)
        }

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 500)
        }
    }

    /// 流式翻译的长度阈值
    pub struct StreamingThreshold;
    impl EnvVar<usize> for StreamingThreshold {
        const NAME: &'static str = "NATIVE_TRANSLATE_STREAMING_THRESHOLD";
        const DESCRIPTION: &'static str = "Minimum text length (chars) for streaming translation";

        fn default_value() -> Option<usize> {
            Some(500)
        }

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }

    /// 等待翻译能力就绪的最长时间
    pub struct AdapterWait;
    impl EnvVar<Duration> for AdapterWait {
        const NAME: &'static str = "NATIVE_TRANSLATE_ADAPTER_WAIT_MS";
        const DESCRIPTION: &'static str = "How long to poll for the translation capability (ms)";

        fn default_value() -> Option<Duration> {
            Some(Duration::from_millis(1500))
        }

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 0, 60_000)
        }
    }

    /// 桥接请求超时
    pub struct BridgeTimeout;
    impl EnvVar<Duration> for BridgeTimeout {
        const NAME: &'static str = "NATIVE_TRANSLATE_BRIDGE_TIMEOUT_MS";
        const DESCRIPTION: &'static str = "Bridge request timeout (ms)";

        fn default_value() -> Option<Duration> {
            Some(Duration::from_millis(10_000))
        }

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 100, 120_000)
        }
    }
}

/// 存储相关环境变量
pub mod storage {
    use super::*;

    /// 持久化存储文件路径
    pub struct StorePath;
    impl EnvVar<String> for StorePath {
        const NAME: &'static str = "NATIVE_TRANSLATE_STORE_PATH";
        const DESCRIPTION: &'static str = "JSON file backing the durable local store";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path cannot be empty".to_string(),
                });
            }
            Ok(shellexpand::tilde(path).to_string())
        }
    }
}

/// 辅助函数
fn parse_language_tag(value: &str, var_name: &str, allow_auto: bool) -> EnvResult<String> {
    let tag = value.trim();
    if allow_auto && tag.eq_ignore_ascii_case("auto") {
        return Ok("auto".to_string());
    }

    let valid = !tag.is_empty()
        && tag.split('-').all(|part| {
            !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_alphanumeric())
        });

    if valid {
        Ok(tag.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language tag '{}'", value),
        })
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_millis(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<Duration> {
    let millis: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of milliseconds".to_string(),
    })?;

    if millis < min || millis > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {}ms must be within {}..={}", millis, min, max),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<V: EnvVar<T>, T: fmt::Debug>() -> String {
        format!(
            "- `{}`: {} (default: {:?})\n",
            V::NAME,
            V::DESCRIPTION,
            V::default_value()
        )
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&line::<core::LogLevel, String>());

    docs.push_str("\n## Translation\n\n");
    docs.push_str(&line::<translation::TargetLanguage, String>());
    docs.push_str(&line::<translation::InputTargetLanguage, String>());
    docs.push_str(&line::<translation::SourceLanguage, String>());
    docs.push_str(&line::<translation::HotkeyModifier, String>());
    docs.push_str(&line::<translation::ApiUrl, String>());
    docs.push_str(&line::<translation::BatchSize, usize>());
    docs.push_str(&line::<translation::StreamingThreshold, usize>());
    docs.push_str(&line::<translation::AdapterWait, Duration>());
    docs.push_str(&line::<translation::BridgeTimeout, Duration>());

    docs.push_str("\n## Storage\n\n");
    docs.push_str(&line::<storage::StorePath, String>());

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(super::core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(super::core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_language_tag_validation() {
        assert_eq!(translation::TargetLanguage::parse(" zh-TW ").unwrap(), "zh-TW");
        assert_eq!(translation::SourceLanguage::parse("AUTO").unwrap(), "auto");
        assert!(translation::TargetLanguage::parse("auto").is_ok());
        assert!(translation::TargetLanguage::parse("zh_CN").is_err());
        assert!(translation::TargetLanguage::parse("").is_err());
    }

    #[test]
    fn test_hotkey_modifier_parsing() {
        assert_eq!(translation::HotkeyModifier::parse("Ctrl").unwrap(), "control");
        assert_eq!(translation::HotkeyModifier::parse("shift").unwrap(), "shift");
        assert!(translation::HotkeyModifier::parse("meta").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::ApiUrl::parse("http://localhost:1188/translate").is_ok());
        assert!(translation::ApiUrl::parse("https://api.example.com").is_ok());
        assert!(translation::ApiUrl::parse("ftp://example.com").is_err());
        assert!(translation::ApiUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::BatchSize::parse("20").unwrap(), 20);
        assert!(translation::BatchSize::parse("0").is_err());
        assert_eq!(
            translation::BridgeTimeout::parse("2500").unwrap(),
            Duration::from_millis(2500)
        );
        assert!(translation::BridgeTimeout::parse("10").is_err());
    }

    #[test]
    fn test_unset_variable_uses_default() {
        env::remove_var("NATIVE_TRANSLATE_STREAMING_THRESHOLD");
        assert!(translation::StreamingThreshold::lookup().is_none());
        assert_eq!(translation::StreamingThreshold::get().unwrap(), 500);
    }

    #[test]
    fn test_generate_env_docs_lists_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("NATIVE_TRANSLATE_BATCH_SIZE"));
        assert!(docs.contains("NATIVE_TRANSLATE_STORE_PATH"));
    }
}
