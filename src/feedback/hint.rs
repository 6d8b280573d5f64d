//! 输入框光标处的翻译提示
//!
//! 提示在翻译开始后延迟出现；翻译在延迟内完成时不显示。

use std::cell::{Cell, RefCell};
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use markup5ever_rcdom::Handle;

use super::{classify, feedback_attrs, render_feedback, FeedbackState, FeedbackSurface};
use crate::parsers::html::dom::{append_child, detach, get_body, get_node_attr, set_node_attr};
use crate::translation::config::constants;

const DEFAULT_MESSAGE: &str = "正在准备翻译…";
const CARET_GAP: i32 = 4;

/// 光标所在的矩形，坐标相对可视区域
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaretRect {
    pub left: i32,
    pub top: i32,
    pub height: i32,
}

/// 光标处的小提示
pub struct InlineHint {
    document: Handle,
    caret: Cell<CaretRect>,
    element: RefCell<Option<Handle>>,
    last_message: RefCell<Option<String>>,
    revealed: Cell<bool>,
    delay: Duration,
    exit_delay: Duration,
}

impl InlineHint {
    pub fn new(document: Handle, caret: CaretRect) -> Self {
        Self {
            document,
            caret: Cell::new(caret),
            element: RefCell::new(None),
            last_message: RefCell::new(None),
            revealed: Cell::new(false),
            delay: constants::HINT_DELAY,
            exit_delay: constants::EXIT_ANIMATION,
        }
    }

    pub fn with_timings(mut self, delay: Duration, exit_delay: Duration) -> Self {
        self.delay = delay;
        self.exit_delay = exit_delay;
        self
    }

    /// 出现前的延迟
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed.get()
    }

    pub fn element(&self) -> Option<Handle> {
        self.element.borrow().clone()
    }

    /// 延迟结束，显示最近一条提示
    pub fn reveal(&self) {
        if self.revealed.replace(true) {
            return;
        }

        let element = create_hint_element();
        apply_position(&element, self.caret.get());
        let parent = get_body(&self.document).unwrap_or_else(|| self.document.clone());
        append_child(&parent, element.clone());
        *self.element.borrow_mut() = Some(element.clone());

        let message = self
            .last_message
            .borrow()
            .clone()
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        render_feedback(&element, constants::INLINE_HINT_CLASS, &message);
    }

    /// 光标移动后重新定位
    pub fn reposition(&self, caret: CaretRect) {
        self.caret.set(caret);
        if let Some(element) = self.element() {
            apply_position(&element, caret);
        }
    }
}

fn create_hint_element() -> Handle {
    crate::parsers::html::dom::create_element(
        "div",
        feedback_attrs(vec![
            ("class", constants::INLINE_HINT_CLASS),
            ("role", "status"),
        ]),
    )
}

fn apply_position(element: &Handle, caret: CaretRect) {
    set_node_attr(
        element,
        "style",
        Some(format!(
            "position:fixed;left:{}px;top:{}px;z-index:2147483647",
            caret.left,
            caret.top + caret.height + CARET_GAP
        )),
    );
}

impl FeedbackSurface for InlineHint {
    fn show(&self, message: &str) -> FeedbackState {
        *self.last_message.borrow_mut() = Some(message.to_string());

        match self.element() {
            Some(element) if self.revealed.get() => {
                render_feedback(&element, constants::INLINE_HINT_CLASS, message)
            }
            _ => classify(message),
        }
    }

    fn dismiss(&self) -> LocalBoxFuture<'_, ()> {
        async move {
            let Some(element) = self.element() else {
                return;
            };

            set_node_attr(&element, "data-leaving", Some("1".to_string()));
            tokio::time::sleep(self.exit_delay).await;

            if get_node_attr(&element, "data-leaving").is_some() {
                detach(&element);
                self.element.borrow_mut().take();
            }
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_nodes, html_to_dom, is_attached};
    use crate::parsers::html::serializer::serialize_node;

    fn document() -> markup5ever_rcdom::RcDom {
        html_to_dom(b"<html><body><textarea></textarea></body></html>", "utf-8").unwrap()
    }

    #[test]
    fn test_hidden_until_revealed() {
        let dom = document();
        let hint = InlineHint::new(dom.document.clone(), CaretRect::default());

        assert_eq!(hint.show("Downloading 20%"), FeedbackState::Progress);
        assert!(hint.element().is_none());
        assert_eq!(find_nodes(&dom.document, &["html", "body", "div"]).len(), 0);

        hint.reveal();
        let element = hint.element().unwrap();
        assert!(serialize_node(&element).contains("width:20%"));
    }

    #[test]
    fn test_position_follows_caret() {
        let dom = document();
        let hint = InlineHint::new(
            dom.document.clone(),
            CaretRect {
                left: 10,
                top: 100,
                height: 18,
            },
        );
        hint.reveal();
        let style = get_node_attr(&hint.element().unwrap(), "style").unwrap();
        assert!(style.contains("left:10px;top:122px"));

        hint.reposition(CaretRect {
            left: 40,
            top: 0,
            height: 10,
        });
        let style = get_node_attr(&hint.element().unwrap(), "style").unwrap();
        assert!(style.contains("left:40px;top:14px"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_removes_after_exit() {
        let dom = document();
        let hint = InlineHint::new(dom.document.clone(), CaretRect::default());
        hint.reveal();
        hint.show("翻译完成");
        let element = hint.element().unwrap();

        hint.dismiss().await;
        assert!(!is_attached(&element));
    }

    #[tokio::test]
    async fn test_dismiss_without_reveal_is_noop() {
        let dom = document();
        let hint = InlineHint::new(dom.document.clone(), CaretRect::default());
        hint.show("翻译完成");
        hint.dismiss().await;
        assert!(hint.element().is_none());
    }
}
