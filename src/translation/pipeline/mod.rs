//! 翻译管道
//!
//! 扫描文档得到翻译单元，抽取带标记的文本，按批次翻译并写回页面。

pub mod batch;
pub mod markers;
pub mod scanner;
pub mod streaming;

pub use batch::{BatchOrchestrator, BatchReport};
pub use markers::{extract, render, render_checked, Extraction, Fragment, MarkerEntry, MarkerMap};
pub use scanner::{
    collect_translatable_blocks, find_translatable_ancestor, prepare_document_for_translation,
    BlockScanner, CaptureKind, ScanStats, TranslationUnit,
};
pub use streaming::{
    translate_line_with_streaming_support, LineTranslation, LiveTranslation, ReaderHandle,
    StringChunks, TranslationRoute,
};
