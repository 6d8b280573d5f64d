//! 带占位标记的文本抽取与还原
//!
//! 抽取时把图片、代码等不可翻译元素替换为 `[[NTn]]`，把链接替换为
//! `[[NTn_S]]…[[NTn_E]]`，原节点的副本保存在 [`MarkerMap`] 中。翻译完成后
//! 按标记把副本重新拼回去，链接内的译文放回链接壳里。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;

use crate::parsers::html::dom::{
    append_child, append_text, clone_element_shell, create_element, create_text_node, deep_clone,
    get_node_attr, get_node_name, has_class,
};
use crate::parsers::html::utils::collapse_whitespace;
use crate::translation::config::constants;

/// 标记对应的原始节点
#[derive(Debug, Clone)]
pub enum MarkerEntry {
    /// 整体替换的元素，保存深拷贝
    Void(Handle),
    /// 包裹译文的元素，只保存标签和属性
    Span(Handle),
}

pub type MarkerMap = BTreeMap<usize, MarkerEntry>;

/// 还原后的节点序列
pub type Fragment = Vec<Handle>;

/// 抽取结果
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    /// 没有任何标记时为 `None`
    pub node_map: Option<MarkerMap>,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[\[\s*NT(\d+)(_S|_E)?\s*\]\]").unwrap_or_else(|e| {
            // 模式是常量，编译失败只可能是程序错误
            panic!("marker pattern: {}", e)
        })
    })
}

/// 是否为翻译输出（译文、骨架屏等）
pub fn is_translation_output(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
        && (get_node_attr(node, constants::OUTPUT_ATTR).is_some()
            || has_class(node, constants::OUTPUT_CLASS)
            || has_class(node, constants::SKELETON_CLASS))
}

// ============================================================================
// 抽取
// ============================================================================

struct Extractor {
    text: String,
    map: MarkerMap,
    next_index: usize,
}

impl Extractor {
    fn visit_children(&mut self, node: &Handle) {
        for child in node.children.borrow().iter() {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: &Handle) {
        match &node.data {
            NodeData::Text { contents } => {
                self.text.push_str(&collapse_whitespace(&contents.borrow()));
            }
            NodeData::Element { .. } => {
                if is_translation_output(node) {
                    return;
                }

                let name = get_node_name(node).unwrap_or_default();

                if constants::SILENT_TAGS.contains(&name) {
                    return;
                }

                if name == "br" {
                    self.text.push('\n');
                    return;
                }

                if constants::VOID_MARKER_TAGS.contains(&name) {
                    let index = self.allocate();
                    self.map.insert(index, MarkerEntry::Void(deep_clone(node)));
                    self.text.push_str(&format!("[[NT{}]]", index));
                    return;
                }

                if name == "a" {
                    if let Some(shell) = clone_element_shell(node) {
                        let index = self.allocate();
                        self.map.insert(index, MarkerEntry::Span(shell));
                        self.text.push_str(&format!("[[NT{}_S]]", index));
                        self.visit_children(node);
                        self.text.push_str(&format!("[[NT{}_E]]", index));
                        return;
                    }
                }

                self.visit_children(node);
            }
            _ => {}
        }
    }

    fn allocate(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

/// 规范化空白：行内连续空格合并，行首行尾空格去掉
fn normalize_text(raw: &str) -> String {
    raw.split('\n')
        .map(|line| collapse_whitespace(line).trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// 抽取元素文本，不可翻译的子元素替换为标记
pub fn extract(element: &Handle) -> Extraction {
    let mut extractor = Extractor {
        text: String::new(),
        map: MarkerMap::new(),
        next_index: 0,
    };
    extractor.visit_children(element);

    Extraction {
        text: normalize_text(&extractor.text),
        node_map: if extractor.map.is_empty() {
            None
        } else {
            Some(extractor.map)
        },
    }
}

/// 去掉文本中的全部标记
pub fn strip_markers(text: &str) -> String {
    let stripped = marker_regex().replace_all(text, "");
    normalize_text(&stripped)
}

// ============================================================================
// 还原
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Void,
    Start,
    End,
}

struct Token<'a> {
    literal: &'a str,
    index: Option<usize>,
    kind: MarkerKind,
}

/// 切分出文本段与标记，`index` 为 `None` 表示普通文本
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for captures in marker_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() > cursor {
            tokens.push(Token {
                literal: &text[cursor..whole.start()],
                index: None,
                kind: MarkerKind::Void,
            });
        }

        let index = captures.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
        let kind = match captures.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
            Some(suffix) if suffix == "_S" => MarkerKind::Start,
            Some(_) => MarkerKind::End,
            None => MarkerKind::Void,
        };

        tokens.push(Token {
            literal: whole.as_str(),
            // 数字溢出时按普通文本处理
            index,
            kind,
        });
        cursor = whole.end();
    }

    if cursor < text.len() {
        tokens.push(Token {
            literal: &text[cursor..],
            index: None,
            kind: MarkerKind::Void,
        });
    }

    tokens
}

/// 正在构建的片段：根序列加上打开的链接壳
struct FragmentBuilder {
    roots: Fragment,
    stack: Vec<(usize, Handle)>,
}

impl FragmentBuilder {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn push_node(&mut self, node: Handle) {
        match self.stack.last() {
            Some((_, parent)) => append_child(parent, node),
            None => self.roots.push(node),
        }
    }

    fn push_plain(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.stack.last() {
            Some((_, parent)) => append_text(parent, text),
            None => match self.roots.last() {
                Some(last) if matches!(last.data, NodeData::Text { .. }) => append_text(last, text),
                _ => self.roots.push(create_text_node(text)),
            },
        }
    }

    /// 文本中的换行还原为 `<br>`
    fn push_text(&mut self, text: &str) {
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            self.push_plain(first);
        }
        for line in lines {
            self.push_node(create_element("br", vec![]));
            self.push_plain(line);
        }
    }

    fn open(&mut self, index: usize, shell: Handle) {
        self.stack.push((index, shell));
    }

    fn close(&mut self, index: usize) -> bool {
        match self.stack.last() {
            Some((open, _)) if *open == index => {
                if let Some((_, shell)) = self.stack.pop() {
                    self.push_node(shell);
                }
                true
            }
            _ => false,
        }
    }

    fn finish(mut self) -> Fragment {
        // 未闭合的链接壳保留已有内容
        while let Some((_, shell)) = self.stack.pop() {
            self.push_node(shell);
        }
        self.roots
    }
}

/// 按标记还原译文，未知或不匹配的标记原样保留为文本
pub fn render(translated: &str, node_map: &MarkerMap) -> Fragment {
    let mut builder = FragmentBuilder::new();

    for token in tokenize(translated) {
        let Some(index) = token.index else {
            builder.push_text(token.literal);
            continue;
        };

        let handled = match (token.kind, node_map.get(&index)) {
            (MarkerKind::Void, Some(MarkerEntry::Void(original))) => {
                builder.push_node(deep_clone(original));
                true
            }
            (MarkerKind::Start, Some(MarkerEntry::Span(shell))) => {
                builder.open(index, deep_clone(shell));
                true
            }
            (MarkerKind::End, Some(MarkerEntry::Span(_))) => builder.close(index),
            _ => false,
        };

        if !handled {
            builder.push_plain(token.literal);
        }
    }

    builder.finish()
}

/// 检查标记是否全部已知、成对且正确嵌套，并且每个标记恰好出现一次
pub fn markers_balanced(translated: &str, node_map: &MarkerMap) -> bool {
    let mut stack: Vec<usize> = Vec::new();
    let mut seen: BTreeSet<usize> = BTreeSet::new();

    for token in tokenize(translated) {
        if token.literal.is_empty() {
            continue;
        }
        let Some(index) = token.index else {
            if marker_regex().is_match(token.literal) {
                return false;
            }
            continue;
        };

        match (token.kind, node_map.get(&index)) {
            (MarkerKind::Void, Some(MarkerEntry::Void(_))) => {
                if !seen.insert(index) {
                    return false;
                }
            }
            (MarkerKind::Start, Some(MarkerEntry::Span(_))) => {
                if !seen.insert(index) {
                    return false;
                }
                stack.push(index);
            }
            (MarkerKind::End, Some(MarkerEntry::Span(_))) => {
                if stack.pop() != Some(index) {
                    return false;
                }
            }
            _ => return false,
        }
    }

    stack.is_empty() && seen.len() == node_map.len() && node_map.keys().all(|k| seen.contains(k))
}

/// 校验后还原；标记损坏时退化为去掉标记的纯文本
pub fn render_checked(translated: &str, node_map: &MarkerMap) -> Fragment {
    if markers_balanced(translated, node_map) {
        return render(translated, node_map);
    }

    tracing::debug!("译文中的标记不完整，退化为纯文本");
    let mut builder = FragmentBuilder::new();
    builder.push_text(&strip_markers(translated));
    builder.finish()
}

/// 把片段依次追加到父节点
pub fn append_fragment(parent: &Handle, fragment: Fragment) {
    for node in fragment {
        if let NodeData::Text { contents } = &node.data {
            let text = contents.borrow().to_string();
            append_text(parent, &text);
        } else {
            append_child(parent, node);
        }
    }
}
