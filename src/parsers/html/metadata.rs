//! 文档元数据读取

use markup5ever_rcdom::Handle;

use super::dom::{find_nodes, get_child_node_by_name, get_node_attr, text_content};

/// 获取文档声明的字符集
///
/// 支持 `<meta charset>` 与 `<meta http-equiv="content-type">` 两种写法。
pub fn get_charset(document: &Handle) -> Option<String> {
    for meta_node in find_nodes(document, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            return Some(charset.trim().to_string());
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(content) = get_node_attr(meta_node, "content") {
                let charset = content.split(';').find_map(|part| {
                    let (key, value) = part.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("charset")
                        .then(|| value.trim().trim_matches('"').to_string())
                });
                if charset.is_some() {
                    return charset;
                }
            }
        }
    }

    None
}

/// 获取 `<html lang>`，空值视为未设置
pub fn get_document_lang(document: &Handle) -> Option<String> {
    get_child_node_by_name(document, "html")
        .and_then(|html| get_node_attr(&html, "lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

/// 获取文档标题
pub fn get_title(document: &Handle) -> Option<String> {
    find_nodes(document, &["html", "head", "title"])
        .first()
        .map(|title| text_content(title).trim().to_string())
}
