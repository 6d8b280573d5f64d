//! 翻译进度提示
//!
//! 提示文本先经 [`classify`] 归类为普通、进度、成功或警告，再由具体的
//! [`FeedbackSurface`] 展示：页面角落的浮层、输入框光标处的小提示，或者
//! 在命令行下直接写日志。

pub mod hint;
pub mod overlay;

use std::sync::OnceLock;

use futures::future::{FutureExt, LocalBoxFuture};
use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::parsers::html::dom::{
    append_child, append_text, clear_children, create_attribute, create_element, set_node_attr,
};
use crate::translation::config::constants;

pub use hint::{CaretRect, InlineHint};
pub use overlay::{PageOverlay, Viewport};

/// 提示类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackState {
    Info,
    Progress,
    Success,
    Warning,
}

impl FeedbackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Warning => "warning",
        }
    }
}

const WARNING_KEYWORDS: &[&str] = &[
    "error", "failed", "fail", "unavailable", "unsupported", "timeout", "失败", "错误", "不可用",
    "不支持", "超时",
];

const SUCCESS_KEYWORDS: &[&str] = &["complete", "completed", "done", "finished", "完成", "已就绪"];

const PROGRESS_KEYWORDS: &[&str] = &[
    "download", "downloading", "translating", "preparing", "loading", "下载", "翻译中", "正在",
    "准备",
];

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,3})\s*%").unwrap_or_else(|e| panic!("percent pattern: {}", e))
    })
}

/// 提取消息中的百分比，超过 100 按 100 计
pub fn extract_percent(message: &str) -> Option<u8> {
    percent_regex()
        .captures(message)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|value| value.min(100) as u8)
}

/// 按关键词归类提示文本
pub fn classify(message: &str) -> FeedbackState {
    let lower = message.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if contains_any(WARNING_KEYWORDS) {
        FeedbackState::Warning
    } else if contains_any(SUCCESS_KEYWORDS) {
        FeedbackState::Success
    } else if extract_percent(message).is_some() || contains_any(PROGRESS_KEYWORDS) {
        FeedbackState::Progress
    } else {
        FeedbackState::Info
    }
}

pub fn icon_for(state: FeedbackState) -> &'static str {
    match state {
        FeedbackState::Info => "ℹ",
        FeedbackState::Progress => "⏳",
        FeedbackState::Success => "✓",
        FeedbackState::Warning => "⚠",
    }
}

/// 提示的展示方式
pub trait FeedbackSurface {
    /// 显示一条提示，返回归类结果
    fn show(&self, message: &str) -> FeedbackState;

    /// 播放离场动画后移除
    fn dismiss(&self) -> LocalBoxFuture<'_, ()>;
}

/// 只写日志的提示，用于命令行
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl FeedbackSurface for TracingFeedback {
    fn show(&self, message: &str) -> FeedbackState {
        let state = classify(message);
        match state {
            FeedbackState::Warning => tracing::warn!(state = state.as_str(), "{}", message),
            FeedbackState::Progress => tracing::debug!(state = state.as_str(), "{}", message),
            _ => tracing::info!(state = state.as_str(), "{}", message),
        }
        state
    }

    fn dismiss(&self) -> LocalBoxFuture<'_, ()> {
        async {}.boxed_local()
    }
}

/// 把提示内容渲染进容器：图标、文本，有百分比时附带进度条
pub(crate) fn render_feedback(container: &Handle, class_prefix: &str, message: &str) -> FeedbackState {
    let state = classify(message);

    set_node_attr(container, "data-state", Some(state.as_str().to_string()));
    set_node_attr(container, "data-leaving", None);
    clear_children(container);

    let icon = create_element(
        "span",
        vec![
            create_attribute("class", &format!("{}__icon", class_prefix)),
            create_attribute("aria-hidden", "true"),
        ],
    );
    append_text(&icon, icon_for(state));
    append_child(container, icon);

    let text = create_element(
        "span",
        vec![create_attribute("class", &format!("{}__message", class_prefix))],
    );
    append_text(&text, message);
    append_child(container, text);

    if let Some(percent) = extract_percent(message) {
        let bar = create_element(
            "div",
            vec![create_attribute("class", &format!("{}__bar", class_prefix))],
        );
        let fill = create_element(
            "div",
            vec![
                create_attribute("class", &format!("{}__bar-fill", class_prefix)),
                create_attribute("style", &format!("width:{}%", percent)),
            ],
        );
        append_child(&bar, fill);
        append_child(container, bar);
    }

    state
}

/// 提示元素的公共属性，带输出标记以免被扫描
pub(crate) fn feedback_attrs(extra: Vec<(&str, &str)>) -> Vec<html5ever::interface::Attribute> {
    let mut attrs = vec![create_attribute(constants::OUTPUT_ATTR, "1")];
    attrs.extend(extra.into_iter().map(|(k, v)| create_attribute(k, v)));
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::serializer::serialize_node;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("Downloading model 42%"), FeedbackState::Progress);
        assert_eq!(classify("正在准备翻译模型…"), FeedbackState::Progress);
        assert_eq!(classify("翻译完成"), FeedbackState::Success);
        assert_eq!(classify("Translation complete"), FeedbackState::Success);
        assert_eq!(classify("Translator unavailable"), FeedbackState::Warning);
        assert_eq!(classify("翻译失败"), FeedbackState::Warning);
        assert_eq!(classify("使用已缓存的翻译模型"), FeedbackState::Info);
    }

    #[test]
    fn test_extract_percent_clamps() {
        assert_eq!(extract_percent("下载中 7%"), Some(7));
        assert_eq!(extract_percent("at 250 %"), Some(100));
        assert_eq!(extract_percent("no number"), None);
    }

    #[test]
    fn test_render_feedback_with_bar() {
        let container = create_element("div", vec![]);
        let state = render_feedback(&container, "nt", "Downloading 30%");
        assert_eq!(state, FeedbackState::Progress);
        let html = serialize_node(&container);
        assert!(html.contains(r#"data-state="progress""#));
        assert!(html.contains(r#"<div class="nt__bar-fill" style="width:30%"></div>"#));
        assert!(html.contains("Downloading 30%"));
    }
}
