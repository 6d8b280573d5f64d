//! 翻译模块
//!
//! 提供页面内翻译的全部组成部分：
//! - **capability**: 宿主翻译与语言检测能力的抽象、适配与翻译器池
//! - **pipeline**: 段落扫描、内联标记、流式翻译与批次编排
//! - **bridge**: 扩展环境拿不到能力时经由页面上下文转发请求
//! - **storage**: 会话缓存、键值存储与语言对就绪记录
//! - **core**: 会话上下文与翻译服务
//! - **config** / **settings**: 运行配置与弹窗设置
//! - **messages**: 运行时消息协议
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use native_translate::feedback::TracingFeedback;
//! use native_translate::parsers::html_to_dom;
//! use native_translate::translation::{
//!     ExtensionStorage, SessionContext, StaticCapabilityHost, TranslationConfig, TranslationService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionContext::new(
//!     Arc::new(StaticCapabilityHost::new()),
//!     Arc::new(ExtensionStorage::in_memory()),
//!     TranslationConfig::default(),
//! );
//! let service = TranslationService::new(session);
//!
//! let dom = html_to_dom(b"<p>Hello there, world</p>", "utf-8")?;
//! let page = service
//!     .translate_page(&dom.document, "zh-CN", &TracingFeedback)
//!     .await?;
//! println!("翻译了 {} 段", page.report.translated);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

pub mod bridge;
pub mod capability;
pub mod config;
pub mod core;
pub mod error;
pub mod languages;
pub mod messages;
pub mod pipeline;
pub mod settings;
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{PageTranslation, SessionContext, TextTranslation, TranslationService};

pub use config::{constants, ConfigManager, TranslationConfig};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

pub use capability::{
    Availability, CapabilityHost, StaticCapabilityHost, TranslatorFactory, TranslatorHandle,
};

pub use bridge::{BridgeTransport, PageWindow};

pub use messages::{MessageResponse, RuntimeMessage};

pub use settings::{HotkeyModifier, PopupSettings, SettingsStore};

pub use storage::{ExtensionStorage, TranslationCache};
