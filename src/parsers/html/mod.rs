//! HTML解析和处理模块
//!
//! - `utils`: 基础工具函数和常量
//! - `dom`: 基础DOM操作
//! - `metadata`: 文档元数据读取
//! - `serializer`: 序列化功能
//! - `gateway`: 可见性判断与DOM修改的抽象

pub mod dom;
pub mod gateway;
pub mod metadata;
pub mod serializer;
pub mod utils;

// 重新导出主要的公共 API
pub use dom::{
    append_child, create_attribute, create_element, create_text_node, deep_clone, find_by_id,
    find_nodes, get_body, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node,
    html_to_dom, insert_after, is_attached, set_node_attr, text_content,
};
pub use gateway::{DocumentGateway, RcDomGateway};
pub use metadata::{get_charset, get_document_lang, get_title};
pub use serializer::{serialize_document, serialize_node};
pub use utils::{collapse_whitespace, WHITESPACES};
