//! 翻译核心
//!
//! - **会话** (`session.rs`): 一个文档的缓存、翻译器池、检测器与桥接
//! - **服务** (`service.rs`): 整页、单个元素与文本三种翻译入口
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── SessionContext (session.rs)
//!     │       ├── TranslatorPool / AdapterResolver (capability/)
//!     │       ├── TranslationCache / PairReadinessLedger (storage/)
//!     │       └── BridgeTransport (bridge/)
//!     └── BlockScanner → BatchOrchestrator (pipeline/)
//! ```

pub mod service;
pub mod session;

pub use service::{
    PageTranslation, ServiceStats, ServiceStatsSnapshot, TextTranslation, TranslationService,
};
pub use session::SessionContext;
