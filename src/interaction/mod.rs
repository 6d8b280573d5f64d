//! 用户交互控制器
//!
//! - [`hover`]: 按住修饰键悬停翻译段落
//! - [`triple_space`]: 输入框内连按三次空格翻译整段输入
//!
//! 两个控制器都只维护交互状态，真正的翻译交给
//! [`TranslationService`](crate::translation::TranslationService)。

pub mod hover;
pub mod triple_space;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::dom::{get_node_attr, get_node_name, get_parent_node};

pub use hover::HoverController;
pub use triple_space::{EditableField, FieldKind, KeyDisposition, Selection, TripleSpaceController};

/// 可以直接编辑文本的 `<input>` 类型，空类型等同 text
pub const TEXT_INPUT_TYPES: &[&str] = &["", "text", "search", "url", "email", "tel"];

/// 正在翻译的元素集合
///
/// 只保存弱引用，元素从文档移除并释放后自动失效。
#[derive(Debug, Default)]
pub struct InFlightSet {
    entries: RefCell<Vec<Weak<Node>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入集合，已存在时返回 false
    pub fn insert(&self, element: &Handle) -> bool {
        self.prune();
        if self.contains(element) {
            return false;
        }
        self.entries.borrow_mut().push(Rc::downgrade(element));
        true
    }

    pub fn contains(&self, element: &Handle) -> bool {
        self.entries
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|entry| Rc::ptr_eq(&entry, element))
    }

    pub fn remove(&self, element: &Handle) {
        self.entries.borrow_mut().retain(|entry| match entry.upgrade() {
            Some(entry) => !Rc::ptr_eq(&entry, element),
            None => false,
        });
    }

    /// 仍然存活的条目数
    pub fn len(&self) -> usize {
        self.prune();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self) {
        self.entries
            .borrow_mut()
            .retain(|entry| entry.strong_count() > 0);
    }
}

/// 节点是否处在可编辑区域：文本输入框、文本域或 contenteditable 宿主
pub fn is_editable_context(node: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(element) = current {
        match get_node_name(&element) {
            Some("textarea") => return true,
            Some("input") => {
                let input_type = get_node_attr(&element, "type").unwrap_or_default();
                return TEXT_INPUT_TYPES.contains(&input_type.to_lowercase().as_str());
            }
            _ => {}
        }

        if let Some(value) = get_node_attr(&element, "contenteditable") {
            match value.trim().to_lowercase().as_str() {
                "false" => return false,
                _ => return true,
            }
        }

        current = get_parent_node(&element);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{detach, find_by_id, html_to_dom};

    #[test]
    fn test_editable_context_detection() {
        let dom = html_to_dom(
            br#"<html><body>
                <input id="text"><input id="check" type="checkbox"><input id="mail" type="EMAIL">
                <textarea id="area"></textarea>
                <div contenteditable><p id="inside">x</p></div>
                <div contenteditable="true"><span contenteditable="false"><b id="locked">y</b></span></div>
                <p id="plain">z</p>
            </body></html>"#,
            "utf-8",
        )
        .unwrap();
        let by_id = |id: &str| find_by_id(&dom.document, id).unwrap();

        assert!(is_editable_context(&by_id("text")));
        assert!(!is_editable_context(&by_id("check")));
        assert!(is_editable_context(&by_id("mail")));
        assert!(is_editable_context(&by_id("area")));
        assert!(is_editable_context(&by_id("inside")));
        assert!(!is_editable_context(&by_id("locked")));
        assert!(!is_editable_context(&by_id("plain")));
    }

    #[test]
    fn test_in_flight_set_drops_released_elements() {
        let set = InFlightSet::new();
        let dom = html_to_dom(b"<html><body><p id=a>x</p></body></html>", "utf-8").unwrap();
        let element = find_by_id(&dom.document, "a").unwrap();

        assert!(set.insert(&element));
        assert!(!set.insert(&element));
        assert!(set.contains(&element));

        detach(&element);
        drop(element);
        assert!(set.is_empty());
    }
}
