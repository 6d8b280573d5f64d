//! # Native Translate
//!
//! 在页面内直接翻译网页：按段落扫描文档，保留链接与图片等内联元素，把译文
//! 插在原文旁边。翻译能力来自宿主环境（浏览器内置翻译器或 DeepLX 服务），
//! 拿不到时经由页面桥接转发。
//!
//! ## 模块组织
//!
//! - `env` - 类型化的环境变量
//! - `parsers` - HTML 解析、DOM 操作与序列化
//! - `translation` - 翻译能力、扫描管道、缓存、桥接与翻译服务
//! - `feedback` - 进度浮层与输入框提示
//! - `interaction` - 悬停与三连空格交互
//! - `runtime` - 单个页面上的运行时

pub mod env;
pub mod feedback;
pub mod interaction;
pub mod parsers;
pub mod runtime;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
pub use runtime::ContentRuntime;
pub use translation::{TranslationError, TranslationResult, TranslationService};
