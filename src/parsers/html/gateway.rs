//! 文档网关
//!
//! 可见性判断和 DOM 增删都经过 [`DocumentGateway`]，翻译流程本身不直接
//! 依赖具体的 DOM 实现。

use markup5ever_rcdom::{Handle, NodeData};

use super::dom::{self, get_node_attr, get_parent_node, has_node_attr};
use super::utils::parse_inline_style;

/// 平台相关的 DOM 查询与修改
pub trait DocumentGateway {
    /// 元素是否对用户可见
    fn is_visible(&self, element: &Handle) -> bool;

    /// 节点是否仍在文档中
    fn is_attached(&self, node: &Handle) -> bool;

    /// 在 `anchor` 之后插入节点，失败时返回 false
    fn insert_after(&self, anchor: &Handle, node: Handle) -> bool;

    fn append_child(&self, parent: &Handle, node: Handle);

    fn remove(&self, node: &Handle);
}

/// 基于 rcdom 的网关，只根据属性和内联样式判断可见性
#[derive(Debug, Default, Clone, Copy)]
pub struct RcDomGateway;

impl RcDomGateway {
    pub fn new() -> Self {
        Self
    }

    fn hidden_by_self(element: &Handle) -> bool {
        if !matches!(element.data, NodeData::Element { .. }) {
            return false;
        }

        if has_node_attr(element, "hidden") {
            return true;
        }

        let Some(style) = get_node_attr(element, "style") else {
            return false;
        };

        let mut zero_width = false;
        let mut zero_height = false;

        for (key, value) in parse_inline_style(&style) {
            match key.as_str() {
                "display" if value == "none" => return true,
                "visibility" if value == "hidden" || value == "collapse" => return true,
                "opacity" if value.parse::<f64>().map(|o| o <= 0.0).unwrap_or(false) => {
                    return true
                }
                "width" => zero_width = is_zero_length(&value),
                "height" => zero_height = is_zero_length(&value),
                _ => {}
            }
        }

        zero_width && zero_height
    }
}

fn is_zero_length(value: &str) -> bool {
    let number = value.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%');
    number.parse::<f64>().map(|n| n == 0.0).unwrap_or(false)
}

impl DocumentGateway for RcDomGateway {
    fn is_visible(&self, element: &Handle) -> bool {
        let mut current = Some(element.clone());
        while let Some(node) = current {
            if Self::hidden_by_self(&node) {
                return false;
            }
            current = get_parent_node(&node);
        }
        true
    }

    fn is_attached(&self, node: &Handle) -> bool {
        dom::is_attached(node)
    }

    fn insert_after(&self, anchor: &Handle, node: Handle) -> bool {
        dom::insert_after(anchor, node)
    }

    fn append_child(&self, parent: &Handle, node: Handle) {
        dom::append_child(parent, node)
    }

    fn remove(&self, node: &Handle) {
        dom::detach(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{create_element, find_by_id, html_to_dom};

    fn visible(html: &str, id: &str) -> bool {
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        let node = find_by_id(&dom.document, id).unwrap();
        RcDomGateway.is_visible(&node)
    }

    #[test]
    fn test_hidden_attribute_and_styles() {
        assert!(visible("<p id='x'>t</p>", "x"));
        assert!(!visible("<p id='x' hidden>t</p>", "x"));
        assert!(!visible("<p id='x' style='display: none'>t</p>", "x"));
        assert!(!visible("<p id='x' style='visibility:hidden'>t</p>", "x"));
        assert!(!visible("<p id='x' style='opacity:0'>t</p>", "x"));
        assert!(visible("<p id='x' style='opacity:0.5'>t</p>", "x"));
    }

    #[test]
    fn test_zero_box_needs_both_dimensions() {
        assert!(!visible("<p id='x' style='width:0;height:0px'>t</p>", "x"));
        assert!(visible("<p id='x' style='width:0'>t</p>", "x"));
    }

    #[test]
    fn test_hidden_ancestor_hides_descendant() {
        assert!(!visible(
            "<div style='display:none'><section><p id='x'>t</p></section></div>",
            "x"
        ));
    }

    #[test]
    fn test_attach_and_remove() {
        let dom = html_to_dom(b"<div id='root'><p id='x'>t</p></div>", "utf-8").unwrap();
        let root = find_by_id(&dom.document, "root").unwrap();
        let gateway = RcDomGateway::new();

        let span = create_element("span", vec![]);
        gateway.append_child(&root, span.clone());
        assert!(gateway.is_attached(&span));

        gateway.remove(&span);
        assert!(!gateway.is_attached(&span));
        assert!(!gateway.insert_after(&span, create_element("em", vec![])));
    }
}
