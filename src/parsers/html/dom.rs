use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use super::utils::WHITESPACES;

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let matches = get_node_name(node) == Some(*node_name);

    if matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }

    let next_names = if matches && !rest.is_empty() {
        rest
    } else {
        node_names
    };

    for child_node in node.children.borrow().iter() {
        found_nodes.append(&mut find_nodes(child_node, next_names));
    }

    found_nodes
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取文档的 body 元素
pub fn get_body(document: &Handle) -> Option<Handle> {
    get_child_node_by_name(document, "html").and_then(|html| get_child_node_by_name(&html, "body"))
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 检查节点是否带有指定属性
pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    get_node_attr(node, attr_name).is_some()
}

/// 检查 class 属性中是否包含指定类名
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split(WHITESPACES).any(|c| c == class_name))
        .unwrap_or(false)
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 检查节点是否仍挂在文档树上
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if let NodeData::Document = current.data {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    let _ = &attrs_mut[i].value.clear();
                    let _ = &attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(create_attribute(attr_name, &attr_value));
            }
        }
    };
}

/// 创建属性
pub fn create_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(name)),
        value: format_tendril!("{}", value),
    }
}

/// 创建一个游离的 HTML 元素
pub fn create_element(tag_name: &str, attrs: Vec<Attribute>) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建一个游离的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 复制元素的标签和属性（不含子节点）
pub fn clone_element_shell(node: &Handle) -> Option<Handle> {
    match &node.data {
        NodeData::Element { name, attrs, .. } => Some(Node::new(NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(None),
            mathml_annotation_xml_integration_point: false,
        })),
        _ => None,
    }
}

/// 深拷贝节点及其子树，返回的节点没有父节点
pub fn deep_clone(node: &Handle) -> Handle {
    let copy = match &node.data {
        NodeData::Element { .. } => match clone_element_shell(node) {
            Some(shell) => shell,
            None => create_text_node(""),
        },
        NodeData::Text { contents } => create_text_node(&contents.borrow()),
        NodeData::Comment { contents } => Node::new(NodeData::Comment {
            contents: contents.clone(),
        }),
        _ => create_text_node(""),
    };

    for child in node.children.borrow().iter() {
        append_child(&copy, deep_clone(child));
    }

    copy
}

/// 把节点从原父节点上摘下
pub fn detach(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 在 `anchor` 之后插入兄弟节点，`anchor` 没有父节点时返回 false
pub fn insert_after(anchor: &Handle, node: Handle) -> bool {
    let Some(parent) = get_parent_node(anchor) else {
        return false;
    };
    detach(&node);

    let mut children = parent.children.borrow_mut();
    let index = children
        .iter()
        .position(|child| Rc::ptr_eq(child, anchor))
        .map(|i| i + 1)
        .unwrap_or(children.len());
    node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(index, node);
    true
}

/// 在 `anchor` 之前插入兄弟节点，`anchor` 没有父节点时返回 false
pub fn insert_before(anchor: &Handle, node: Handle) -> bool {
    let Some(parent) = get_parent_node(anchor) else {
        return false;
    };
    detach(&node);

    let mut children = parent.children.borrow_mut();
    let index = children
        .iter()
        .position(|child| Rc::ptr_eq(child, anchor))
        .unwrap_or(children.len());
    node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(index, node);
    true
}

/// 移除全部子节点
pub fn clear_children(node: &Handle) {
    for child in node.children.borrow_mut().drain(..) {
        child.parent.set(None);
    }
}

/// 在文本节点或元素末尾追加文本
pub fn append_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        contents.borrow_mut().push_slice(text);
        return;
    }

    let last_text = node
        .children
        .borrow()
        .last()
        .filter(|child| matches!(child.data, NodeData::Text { .. }))
        .cloned();

    match last_text {
        Some(text_node) => append_text(&text_node, text),
        None => append_child(node, create_text_node(text)),
    }
}

/// 获取子树的纯文本内容
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// 检查子树（不含自身）中是否存在满足条件的元素
pub fn has_descendant<F>(node: &Handle, predicate: &F) -> bool
where
    F: Fn(&Handle) -> bool,
{
    node.children
        .borrow()
        .iter()
        .any(|child| predicate(child) || has_descendant(child, predicate))
}

/// 按 id 查找元素
pub fn find_by_id(node: &Handle, id: &str) -> Option<Handle> {
    if get_node_attr(node, "id").as_deref() == Some(id) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_by_id(child, id))
}
