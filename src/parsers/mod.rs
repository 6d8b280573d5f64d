//! # 解析器模块
//!
//! HTML 文档解析、DOM 操作与序列化。

pub mod html;

// Re-export commonly used items for convenience
pub use html::{html_to_dom, serialize_document, DocumentGateway, RcDomGateway};
