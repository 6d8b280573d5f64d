//! 输入框三连空格翻译
//!
//! 光标前已有两个空格（含不换行空格）时再按一次空格：拦截这次按键，删掉
//! 那两个空格（光标后还有文字时留下一个），把整段输入翻译成输入目标语言，
//! 译文替换原内容，光标移到末尾。输入法组合期间不检查。

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use markup5ever_rcdom::Handle;

use super::TEXT_INPUT_TYPES;
use crate::feedback::{CaretRect, FeedbackSurface, InlineHint};
use crate::parsers::html::dom::{
    append_text, clear_children, get_node_attr, get_node_name, set_node_attr, text_content,
};
use crate::translation::error::TranslationResult;
use crate::translation::TranslationService;

const NBSP: char = '\u{a0}';

fn is_space(c: char) -> bool {
    c == ' ' || c == NBSP
}

/// 可编辑区域的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Input,
    TextArea,
    ContentEditable,
}

impl FieldKind {
    /// 判断元素是否支持三连空格翻译
    pub fn for_element(element: &Handle) -> Option<Self> {
        match get_node_name(element)? {
            "textarea" => Some(Self::TextArea),
            "input" => {
                let input_type = get_node_attr(element, "type").unwrap_or_default();
                TEXT_INPUT_TYPES
                    .contains(&input_type.to_lowercase().as_str())
                    .then_some(Self::Input)
            }
            _ => match get_node_attr(element, "contenteditable") {
                Some(value) if value.trim().to_lowercase() != "false" => {
                    Some(Self::ContentEditable)
                }
                _ => None,
            },
        }
    }
}

/// 选区，按字符计的偏移
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// 输入框的内容与选区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableField {
    pub id: String,
    pub kind: FieldKind,
    pub value: String,
    pub selection: Selection,
}

impl EditableField {
    /// 光标位于末尾
    pub fn new(id: impl Into<String>, kind: FieldKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let end = value.chars().count();
        Self {
            id: id.into(),
            kind,
            value,
            selection: Selection::caret(end),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// 从文档元素读取；`<input>` 取 value 属性，其余取文本内容
    pub fn from_element(id: impl Into<String>, element: &Handle) -> Option<Self> {
        let kind = FieldKind::for_element(element)?;
        let value = match kind {
            FieldKind::Input => get_node_attr(element, "value").unwrap_or_default(),
            FieldKind::TextArea | FieldKind::ContentEditable => text_content(element),
        };
        Some(Self::new(id, kind, value))
    }

    /// 把内容写回文档元素
    pub fn write_to(&self, element: &Handle) {
        match self.kind {
            FieldKind::Input => set_node_attr(element, "value", Some(self.value.clone())),
            FieldKind::TextArea | FieldKind::ContentEditable => {
                clear_children(element);
                append_text(element, &self.value);
            }
        }
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.value
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// 光标前是否正好是两个空格
    pub fn ends_with_double_space(&self) -> bool {
        if !self.selection.is_collapsed() {
            return false;
        }
        let before = &self.value[..self.byte_offset(self.selection.start)];
        let mut tail = before.chars().rev();
        matches!((tail.next(), tail.next()), (Some(a), Some(b)) if is_space(a) && is_space(b))
    }

    /// 删除光标前的两个空格；光标后还有内容时留一个空格隔开前后文字
    fn strip_double_space(&mut self) {
        let caret = self.selection.start;
        let from = self.byte_offset(caret.saturating_sub(2));
        let to = self.byte_offset(caret);
        let keep = if to < self.value.len() { " " } else { "" };
        self.value.replace_range(from..to, keep);
        self.selection = Selection::caret(caret.saturating_sub(2) + keep.len());
    }

    /// 替换全部内容，光标移到末尾
    pub fn replace_all(&mut self, value: String) {
        self.selection = Selection::caret(value.chars().count());
        self.value = value;
    }
}

/// 按键的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// 交给页面默认处理
    Pass,
    /// 已拦截，需要翻译该输入框
    Translate,
}

/// 三连空格控制器
#[derive(Debug, Default)]
pub struct TripleSpaceController {
    composing: Cell<bool>,
    in_flight: RefCell<HashSet<String>>,
}

impl TripleSpaceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_composition_start(&self) {
        self.composing.set(true);
    }

    pub fn on_composition_end(&self) {
        self.composing.set(false);
    }

    pub fn is_composing(&self) -> bool {
        self.composing.get()
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.borrow().contains(id)
    }

    /// 处理按键；拦截时已删掉光标前的两个空格
    pub fn on_key_down(&self, key: &str, field: &mut EditableField) -> KeyDisposition {
        if key != " " || self.composing.get() || self.is_in_flight(&field.id) {
            return KeyDisposition::Pass;
        }
        if !field.ends_with_double_space() {
            return KeyDisposition::Pass;
        }

        field.strip_double_space();
        KeyDisposition::Translate
    }

    /// 翻译整段输入，延迟显示光标处的提示
    ///
    /// 返回是否替换了内容。同一输入框的翻译不会重叠。
    pub async fn translate_field(
        &self,
        service: &TranslationService,
        document: &Handle,
        field: &mut EditableField,
        target: &str,
        caret: CaretRect,
    ) -> TranslationResult<bool> {
        if field.value.trim().is_empty() {
            return Ok(false);
        }
        if !self.in_flight.borrow_mut().insert(field.id.clone()) {
            return Ok(false);
        }

        let hint = InlineHint::new(document.clone(), caret);
        let text = field.value.clone();
        let result = {
            let work = service.translate_text(
                Some(document),
                &text,
                None,
                target,
                Some(&hint as &dyn FeedbackSurface),
            );
            tokio::pin!(work);

            tokio::select! {
                result = &mut work => result,
                _ = tokio::time::sleep(hint.delay()) => {
                    hint.reveal();
                    work.await
                }
            }
        };
        self.in_flight.borrow_mut().remove(&field.id);

        let changed = match &result {
            Ok(translation) if !translation.text.is_empty() && translation.text != text => {
                field.replace_all(translation.text.clone());
                if hint.is_revealed() {
                    hint.show("翻译完成");
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(field = %field.id, error = %e, "输入框翻译失败");
                if hint.is_revealed() {
                    hint.show(&format!("翻译失败：{}", e.message()));
                }
                false
            }
        };

        hint.dismiss().await;
        result.map(|_| changed)
    }
}
