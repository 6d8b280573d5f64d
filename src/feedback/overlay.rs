//! 页面角落的翻译进度浮层

use std::cell::{Cell, RefCell};
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use markup5ever_rcdom::Handle;

use super::{feedback_attrs, render_feedback, FeedbackState, FeedbackSurface};
use crate::parsers::html::dom::{
    append_child, create_element, detach, find_by_id, get_body, get_node_attr, set_node_attr,
};
use crate::translation::config::constants;

const CLASS_PREFIX: &str = "native-translate-overlay";
const EDGE_GAP: u32 = 16;
const MAX_WIDTH: u32 = 360;

/// 可视区域大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// 固定在页面右上角的浮层
pub struct PageOverlay {
    document: Handle,
    element: RefCell<Option<Handle>>,
    viewport: Cell<Viewport>,
    exit_delay: Duration,
}

impl PageOverlay {
    pub fn new(document: Handle) -> Self {
        Self::with_exit_delay(document, constants::EXIT_ANIMATION)
    }

    pub fn with_exit_delay(document: Handle, exit_delay: Duration) -> Self {
        Self {
            document,
            element: RefCell::new(None),
            viewport: Cell::new(Viewport::default()),
            exit_delay,
        }
    }

    /// 当前浮层元素
    pub fn element(&self) -> Option<Handle> {
        self.element.borrow().clone()
    }

    fn ensure_element(&self) -> Handle {
        if let Some(existing) = self.element() {
            return existing;
        }

        let element = match find_by_id(&self.document, constants::OVERLAY_ID) {
            Some(existing) => existing,
            None => {
                let element = create_element(
                    "div",
                    feedback_attrs(vec![
                        ("id", constants::OVERLAY_ID),
                        ("class", CLASS_PREFIX),
                        ("role", "status"),
                        ("aria-live", "polite"),
                    ]),
                );
                let parent = get_body(&self.document).unwrap_or_else(|| self.document.clone());
                append_child(&parent, element.clone());
                element
            }
        };

        apply_position(&element, self.viewport.get());
        *self.element.borrow_mut() = Some(element.clone());
        element
    }

    /// 可视区域变化后重新定位
    pub fn reposition(&self, viewport: Viewport) {
        self.viewport.set(viewport);
        if let Some(element) = self.element() {
            apply_position(&element, viewport);
        }
    }
}

fn apply_position(element: &Handle, viewport: Viewport) {
    let width = MAX_WIDTH.min(viewport.width.saturating_sub(EDGE_GAP * 2));
    set_node_attr(
        element,
        "style",
        Some(format!(
            "position:fixed;top:{gap}px;right:{gap}px;max-width:{width}px;z-index:2147483647",
            gap = EDGE_GAP,
            width = width
        )),
    );
}

impl FeedbackSurface for PageOverlay {
    fn show(&self, message: &str) -> FeedbackState {
        let element = self.ensure_element();
        render_feedback(&element, CLASS_PREFIX, message)
    }

    fn dismiss(&self) -> LocalBoxFuture<'_, ()> {
        async move {
            let Some(element) = self.element() else {
                return;
            };

            set_node_attr(&element, "data-leaving", Some("1".to_string()));
            tokio::time::sleep(self.exit_delay).await;

            // 等待期间重新显示过则保留
            if get_node_attr(&element, "data-leaving").is_some() {
                detach(&element);
                self.element.borrow_mut().take();
            }
        }
        .boxed_local()
    }
}
