//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型、严重程度分级以及日志助手。
//! 页面翻译过程中任何错误都不能阻断页面，调用方按 `is_recoverable`
//! 决定是切换到桥接通道、降级为空结果还是直接上报。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 当前上下文无法获取翻译能力
    #[error("翻译能力不可用: {0}")]
    CapabilityUnavailable(String),

    /// 桥接请求超时
    #[error("桥接请求超时: {0}")]
    BridgeTimeout(String),

    /// 桥接宿主返回失败
    #[error("桥接错误: {0}")]
    BridgeError(String),

    /// 翻译服务错误
    #[error("翻译服务错误: {0}")]
    TranslationServiceError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可以通过降级路径恢复
    pub fn is_recoverable(&self) -> bool {
        match self {
            TranslationError::CapabilityUnavailable(_) => true,
            TranslationError::BridgeTimeout(_) => true,
            TranslationError::BridgeError(_) => true,
            TranslationError::TranslationServiceError(_) => true,
            TranslationError::NetworkError(_) => true,
            TranslationError::StorageError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::CapabilityUnavailable(_) => ErrorSeverity::Warning,
            TranslationError::BridgeTimeout(_) => ErrorSeverity::Warning,
            TranslationError::BridgeError(_) => ErrorSeverity::Warning,
            TranslationError::TranslationServiceError(_) => ErrorSeverity::Error,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::CapabilityUnavailable(_) => ErrorCategory::Capability,
            TranslationError::BridgeTimeout(_) => ErrorCategory::Bridge,
            TranslationError::BridgeError(_) => ErrorCategory::Bridge,
            TranslationError::TranslationServiceError(_) => ErrorCategory::Service,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 不带前缀的错误消息，用于协议边界上的 `error` 字段
    pub fn message(&self) -> &str {
        match self {
            TranslationError::CapabilityUnavailable(msg)
            | TranslationError::BridgeTimeout(msg)
            | TranslationError::BridgeError(msg)
            | TranslationError::TranslationServiceError(msg)
            | TranslationError::ConfigError(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::StorageError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::InternalError(msg) => msg,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Capability,
    Bridge,
    Service,
    Configuration,
    Network,
    Storage,
    Input,
    Serialization,
    Timeout,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(format!("配置错误: {}", error))
    }
}

#[cfg(feature = "deeplx")]
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("HTTP请求超时: {}", error))
        } else {
            TranslationError::NetworkError(format!("HTTP请求失败: {}", error))
        }
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不改变控制流
    pub fn trace_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!(category = ?error.category(), "翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!(category = ?error.category(), "翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!(category = ?error.category(), "翻译错误: {}", error),
            ErrorSeverity::Critical => {
                tracing::error!(category = ?error.category(), "翻译严重错误: {}", error)
            }
        }
    }

    /// 记录并返回错误
    pub fn log_error<T>(error: TranslationError) -> TranslationResult<T> {
        trace_error(&error);
        Err(error)
    }

    /// 创建能力不可用错误
    pub fn capability_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CapabilityUnavailable(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建存储错误
    pub fn storage_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StorageError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_failures_are_recoverable_warnings() {
        let timeout = TranslationError::BridgeTimeout("10s".to_string());
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.severity(), ErrorSeverity::Warning);
        assert_eq!(timeout.category(), ErrorCategory::Bridge);

        let unavailable = helpers::capability_error("no translator");
        assert!(unavailable.is_recoverable());
        assert_eq!(unavailable.category(), ErrorCategory::Capability);
    }

    #[test]
    fn test_config_error_is_critical() {
        let error = helpers::config_error("bad");
        assert!(!error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_from_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            TranslationError::from(json_err),
            TranslationError::SerializationError(_)
        ));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(
            TranslationError::from(io_err),
            TranslationError::StorageError(_)
        ));
    }
}
