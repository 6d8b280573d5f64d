//! 文档扫描
//!
//! 深度优先遍历文档，按文档顺序找出可翻译的块（翻译单元）：
//! - 强块级元素和不含强块级后代的 `div` 是捕获点，通过阈值即成为翻译单元，
//!   不再向下遍历
//! - 含强块级后代的块只向下遍历
//! - 没有被祖先捕获的 `span`/`a`/`button` 文本足够时单独捕获
//!
//! 扫描前可以先执行 [`prepare_document_for_translation`]，把容器中夹在块级
//! 元素之间的零散行内内容包进单独的 `div`，让它们也能被捕获。

use std::collections::HashSet;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::markers::{self, is_translation_output, MarkerMap};
use crate::parsers::html::dom::{
    append_child, create_attribute, create_element, get_node_attr, get_node_name,
    get_parent_node, has_descendant, insert_before, set_node_attr,
};
use crate::parsers::html::gateway::DocumentGateway;
use crate::translation::config::constants;

/// 捕获方式，决定译文的插入位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// 块级元素，译文追加为最后一个子节点
    Block,
    /// 行内叶子元素，译文插入为下一个兄弟节点
    InlineLeaf,
}

/// 翻译单元
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub element: Handle,
    pub text: String,
    pub node_map: Option<MarkerMap>,
    pub kind: CaptureKind,
}

/// 扫描统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub visited: usize,
    pub captured: usize,
    pub hidden: usize,
    pub already_done: usize,
    pub below_threshold: usize,
}

// ============================================================================
// 判定规则
// ============================================================================

fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

fn tag_of(node: &Handle) -> &str {
    get_node_name(node).unwrap_or_default()
}

fn is_strong_block(node: &Handle) -> bool {
    constants::STRONG_BLOCK_TAGS.contains(&tag_of(node))
}

fn has_strong_block_descendant(node: &Handle) -> bool {
    has_descendant(node, &is_strong_block)
}

/// 非正文标签及代码标签，整个子树都不处理
fn is_excluded_tag(tag: &str) -> bool {
    constants::SKIP_TAGS.contains(&tag) || constants::CODE_TAGS.contains(&tag)
}

fn is_done(node: &Handle) -> bool {
    get_node_attr(node, constants::DONE_ATTR).is_some()
}

/// `nav` 或带导航类 role 的元素
fn is_chrome(node: &Handle) -> bool {
    if tag_of(node) == "nav" {
        return true;
    }
    get_node_attr(node, "role")
        .map(|role| {
            let role = role.trim().to_ascii_lowercase();
            constants::CHROME_ROLES.contains(&role.as_str())
        })
        .unwrap_or(false)
}

fn inside_chrome(node: &Handle) -> bool {
    let mut current = get_parent_node(node);
    while let Some(ancestor) = current {
        if is_element(&ancestor) && is_chrome(&ancestor) {
            return true;
        }
        current = get_parent_node(&ancestor);
    }
    false
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}')
}

/// 统计词数，每个中日韩字符计为一个词
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .map(|token| {
            let cjk = token.chars().filter(|c| is_cjk(*c)).count();
            let has_other = token
                .chars()
                .any(|c| !is_cjk(c) && c.is_alphanumeric());
            cjk + usize::from(has_other)
        })
        .sum()
}

/// 文本是否达到该标签的最小长度要求
pub fn passes_threshold(tag: &str, text: &str) -> bool {
    let plain = markers::strip_markers(text);
    let length = plain.trim().chars().count();

    if length == 0 {
        return false;
    }

    if constants::HEADING_TAGS.contains(&tag) {
        return length >= constants::MIN_HEADING_TEXT_LENGTH;
    }

    if length < constants::MIN_TEXT_LENGTH {
        return false;
    }

    tag != "div" || count_words(&plain) >= constants::MIN_DIV_WORDS
}

/// 元素作为捕获点的方式，`None` 表示不是捕获点
fn capture_kind(node: &Handle) -> Option<CaptureKind> {
    let tag = tag_of(node);

    if is_strong_block(node) || tag == "div" {
        return (!has_strong_block_descendant(node)).then_some(CaptureKind::Block);
    }

    if constants::LEAF_INLINE_TAGS.contains(&tag) {
        return (!has_strong_block_descendant(node)).then_some(CaptureKind::InlineLeaf);
    }

    None
}

// ============================================================================
// 扫描
// ============================================================================

/// 块扫描器
pub struct BlockScanner<'g> {
    gateway: &'g dyn DocumentGateway,
    seen: HashSet<*const markup5ever_rcdom::Node>,
    stats: ScanStats,
}

impl<'g> BlockScanner<'g> {
    pub fn new(gateway: &'g dyn DocumentGateway) -> Self {
        Self {
            gateway,
            seen: HashSet::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// 从 `root` 开始收集翻译单元，结果按文档顺序排列
    pub fn collect_translatable_blocks(&mut self, root: &Handle) -> Vec<TranslationUnit> {
        let mut units = Vec::new();
        let in_chrome = is_element(root) && inside_chrome(root);
        self.visit(root, in_chrome, &mut units);

        tracing::debug!(
            captured = self.stats.captured,
            visited = self.stats.visited,
            hidden = self.stats.hidden,
            done = self.stats.already_done,
            "扫描完成"
        );
        units
    }

    fn visit_children(&mut self, node: &Handle, in_chrome: bool, units: &mut Vec<TranslationUnit>) {
        let children: Vec<Handle> = node.children.borrow().iter().cloned().collect();
        for child in children.iter() {
            self.visit(child, in_chrome, units);
        }
    }

    fn visit(&mut self, node: &Handle, in_chrome: bool, units: &mut Vec<TranslationUnit>) {
        match &node.data {
            NodeData::Document => return self.visit_children(node, in_chrome, units),
            NodeData::Element { .. } => {}
            _ => return,
        }

        self.stats.visited += 1;
        let tag = tag_of(node).to_string();

        if is_excluded_tag(&tag) || is_translation_output(node) {
            return;
        }

        if is_done(node) {
            self.stats.already_done += 1;
            return;
        }

        if !self.gateway.is_visible(node) {
            self.stats.hidden += 1;
            return;
        }

        let child_in_chrome = in_chrome || is_chrome(node);
        let allowed_here = !in_chrome || constants::CHROME_ALLOWED_TAGS.contains(&tag.as_str());

        if allowed_here {
            if let Some(kind) = capture_kind(node) {
                if self.try_capture(node, &tag, kind, units) {
                    return;
                }
            }
        }

        self.visit_children(node, child_in_chrome, units);
    }

    fn try_capture(
        &mut self,
        node: &Handle,
        tag: &str,
        kind: CaptureKind,
        units: &mut Vec<TranslationUnit>,
    ) -> bool {
        // 已包含译文的元素视为处理过
        if has_descendant(node, &is_translation_output) {
            self.stats.already_done += 1;
            return true;
        }

        let extraction = markers::extract(node);
        if extraction.text.is_empty() || !passes_threshold(tag, &extraction.text) {
            self.stats.below_threshold += 1;
            return false;
        }

        if !self.seen.insert(Rc::as_ptr(node)) {
            return true;
        }

        self.stats.captured += 1;
        units.push(TranslationUnit {
            element: node.clone(),
            text: extraction.text,
            node_map: extraction.node_map,
            kind,
        });
        true
    }
}

/// 收集翻译单元的便捷函数
pub fn collect_translatable_blocks(
    gateway: &dyn DocumentGateway,
    root: &Handle,
) -> Vec<TranslationUnit> {
    BlockScanner::new(gateway).collect_translatable_blocks(root)
}

/// 从事件目标向上查找最近的可翻译元素
///
/// 块级捕获点优先；没有块级捕获点时返回最近的行内叶子。
pub fn find_translatable_ancestor(
    gateway: &dyn DocumentGateway,
    target: &Handle,
) -> Option<Handle> {
    let mut leaf_candidate: Option<Handle> = None;
    let mut current = Some(target.clone());

    while let Some(node) = current {
        if is_element(&node) {
            let tag = tag_of(&node).to_string();

            if is_excluded_tag(&tag) || is_translation_output(&node) || is_done(&node) {
                return None;
            }
            if tag == "body" || tag == "html" {
                break;
            }

            let allowed = !inside_chrome(&node)
                || constants::CHROME_ALLOWED_TAGS.contains(&tag.as_str());

            if let (true, Some(kind)) = (allowed, capture_kind(&node)) {
                let text = markers::extract(&node).text;
                if passes_threshold(&tag, &text) && gateway.is_visible(&node) {
                    match kind {
                        CaptureKind::Block => return Some(node),
                        CaptureKind::InlineLeaf if leaf_candidate.is_none() => {
                            leaf_candidate = Some(node.clone());
                        }
                        CaptureKind::InlineLeaf => {}
                    }
                }
            }
        }
        current = get_parent_node(&node);
    }

    leaf_candidate
}

// ============================================================================
// 预处理
// ============================================================================

fn is_blank_text(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().trim().is_empty(),
        _ => false,
    }
}

fn is_loose_inline(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
        NodeData::Element { .. } => {
            let tag = tag_of(node);
            !constants::BLOCK_LEVEL_TAGS.contains(&tag)
                && !constants::SILENT_TAGS.contains(&tag)
                && !is_translation_output(node)
        }
        _ => false,
    }
}

fn is_block_child(node: &Handle) -> bool {
    is_element(node) && constants::BLOCK_LEVEL_TAGS.contains(&tag_of(node))
}

fn collect_containers(node: &Handle, out: &mut Vec<Handle>) {
    if is_element(node) {
        let tag = tag_of(node);
        if is_excluded_tag(tag) || is_translation_output(node) {
            return;
        }
        if constants::CONTENT_CONTAINER_TAGS.contains(&tag) {
            out.push(node.clone());
        }
    }
    for child in node.children.borrow().iter() {
        collect_containers(child, out);
    }
}

/// 把连续的零散行内内容分组，块级子元素是分隔点
fn loose_runs(container: &Handle) -> Vec<Vec<Handle>> {
    let mut runs = Vec::new();
    let mut current: Vec<Handle> = Vec::new();

    for child in container.children.borrow().iter() {
        if is_block_child(child) {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        } else if is_loose_inline(child) || (!current.is_empty() && is_blank_text(child)) {
            current.push(child.clone());
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

/// 把混排容器中的零散行内内容包进 `display:contents` 的 `div`
///
/// 每个容器只处理一次，返回新建的包裹元素数量。
pub fn prepare_document_for_translation(root: &Handle) -> usize {
    let mut containers = Vec::new();
    collect_containers(root, &mut containers);

    let mut wrapped = 0;
    for container in containers.iter() {
        if get_node_attr(container, constants::PREPARED_ATTR).is_some() {
            continue;
        }
        set_node_attr(container, constants::PREPARED_ATTR, Some("1".to_string()));

        let has_block = container.children.borrow().iter().any(is_block_child);
        if !has_block {
            continue;
        }

        for run in loose_runs(container) {
            let Some(first) = run.first() else {
                continue;
            };

            let segment = create_element(
                "div",
                vec![
                    create_attribute(constants::SEGMENT_ATTR, "1"),
                    create_attribute("style", "display:contents"),
                ],
            );
            if !insert_before(first, segment.clone()) {
                continue;
            }
            for node in run {
                append_child(&segment, node);
            }
            wrapped += 1;
        }
    }

    if wrapped > 0 {
        tracing::debug!(wrapped, "已包裹零散行内内容");
    }
    wrapped
}
