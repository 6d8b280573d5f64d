//! 悬停翻译
//!
//! 鼠标悬停在段落上并按住修饰键时触发翻译。同一段落在修饰键松开之前
//! 只触发一次；焦点在可编辑区域内时不触发。

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use super::{is_editable_context, InFlightSet};
use crate::feedback::FeedbackSurface;
use crate::parsers::html::gateway::DocumentGateway;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::scanner::find_translatable_ancestor;
use crate::translation::settings::{HotkeyModifier, PopupSettings};
use crate::translation::TranslationService;

/// 当前按下的修饰键
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModifierState {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl ModifierState {
    pub fn is_held(&self, modifier: HotkeyModifier) -> bool {
        match modifier {
            HotkeyModifier::Alt => self.alt,
            HotkeyModifier::Control => self.ctrl,
            HotkeyModifier::Shift => self.shift,
        }
    }
}

/// 键盘事件的 `key` 值对应的修饰键
fn modifier_for_key(key: &str) -> Option<HotkeyModifier> {
    match key {
        "Alt" | "AltGraph" => Some(HotkeyModifier::Alt),
        "Control" => Some(HotkeyModifier::Control),
        "Shift" => Some(HotkeyModifier::Shift),
        _ => None,
    }
}

/// 悬停翻译控制器
pub struct HoverController {
    modifier: Cell<HotkeyModifier>,
    held: Cell<ModifierState>,
    hovered: RefCell<Option<Handle>>,
    last_triggered: RefCell<Option<Weak<Node>>>,
    editable_focus: Cell<bool>,
    in_flight: InFlightSet,
}

impl HoverController {
    pub fn new(modifier: HotkeyModifier) -> Self {
        Self {
            modifier: Cell::new(modifier),
            held: Cell::new(ModifierState::default()),
            hovered: RefCell::new(None),
            last_triggered: RefCell::new(None),
            editable_focus: Cell::new(false),
            in_flight: InFlightSet::new(),
        }
    }

    pub fn modifier(&self) -> HotkeyModifier {
        self.modifier.get()
    }

    pub fn held(&self) -> ModifierState {
        self.held.get()
    }

    pub fn hovered(&self) -> Option<Handle> {
        self.hovered.borrow().clone()
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// 鼠标移动：重新计算悬停的段落，满足条件时返回要翻译的元素
    pub fn on_mouse_move(
        &self,
        gateway: &dyn DocumentGateway,
        target: &Handle,
        focus: Option<&Handle>,
    ) -> Option<Handle> {
        self.on_focus_change(focus);
        *self.hovered.borrow_mut() = find_translatable_ancestor(gateway, target);
        self.evaluate()
    }

    /// 焦点变化
    pub fn on_focus_change(&self, focus: Option<&Handle>) {
        self.editable_focus
            .set(focus.map(is_editable_context).unwrap_or(false));
    }

    pub fn on_key_down(&self, key: &str) -> Option<Handle> {
        let modifier = modifier_for_key(key)?;
        self.set_held(modifier, true);
        if modifier == self.modifier.get() {
            self.evaluate()
        } else {
            None
        }
    }

    pub fn on_key_up(&self, key: &str) {
        let Some(modifier) = modifier_for_key(key) else {
            return;
        };
        self.set_held(modifier, false);
        if modifier == self.modifier.get() {
            self.last_triggered.borrow_mut().take();
        }
    }

    /// 窗口失去焦点时按键状态不再可靠
    pub fn on_blur(&self) {
        self.held.set(ModifierState::default());
        self.last_triggered.borrow_mut().take();
    }

    /// 设置变化后切换修饰键
    pub fn apply_settings(&self, settings: &PopupSettings) {
        self.apply_hotkey(settings.hotkey());
    }

    pub fn apply_hotkey(&self, modifier: HotkeyModifier) {
        if self.modifier.replace(modifier) != modifier {
            tracing::debug!(modifier = modifier.as_str(), "悬停修饰键已更新");
        }
        self.last_triggered.borrow_mut().take();
    }

    fn set_held(&self, modifier: HotkeyModifier, down: bool) {
        let mut held = self.held.get();
        match modifier {
            HotkeyModifier::Alt => held.alt = down,
            HotkeyModifier::Control => held.ctrl = down,
            HotkeyModifier::Shift => held.shift = down,
        }
        self.held.set(held);
    }

    fn is_last_triggered(&self, element: &Handle) -> bool {
        self.last_triggered
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|last| Rc::ptr_eq(&last, element))
            .unwrap_or(false)
    }

    fn evaluate(&self) -> Option<Handle> {
        if !self.held.get().is_held(self.modifier.get()) || self.editable_focus.get() {
            return None;
        }

        let element = self.hovered()?;
        if self.is_last_triggered(&element) || self.in_flight.contains(&element) {
            return None;
        }

        *self.last_triggered.borrow_mut() = Some(Rc::downgrade(&element));
        Some(element)
    }

    /// 翻译触发的元素，同一元素同时只翻译一次
    pub async fn translate(
        &self,
        service: &TranslationService,
        document: &Handle,
        element: &Handle,
        target: &str,
        surface: Option<&dyn FeedbackSurface>,
    ) -> TranslationResult<bool> {
        if !self.in_flight.insert(element) {
            return Ok(false);
        }

        let result = service
            .translate_element_on_demand(document, element, target, surface)
            .await;
        self.in_flight.remove(element);

        if let Err(e) = &result {
            tracing::debug!(error = %e, "悬停翻译失败");
        }
        result
    }
}

impl Default for HoverController {
    fn default() -> Self {
        Self::new(HotkeyModifier::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_by_id, html_to_dom};
    use crate::parsers::html::gateway::RcDomGateway;

    fn page() -> markup5ever_rcdom::RcDom {
        html_to_dom(
            br#"<html><body>
                <p id="para">A paragraph with <b id="bold">several words</b> in it.</p>
                <p id="other">Another paragraph of reasonable length.</p>
                <textarea id="field"></textarea>
            </body></html>"#,
            "utf-8",
        )
        .unwrap()
    }

    #[test]
    fn test_trigger_once_per_hold() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let bold = find_by_id(&dom.document, "bold").unwrap();
        let para = find_by_id(&dom.document, "para").unwrap();

        assert!(controller.on_mouse_move(&gateway, &bold, None).is_none());
        let triggered = controller.on_key_down("Alt").unwrap();
        assert!(Rc::ptr_eq(&triggered, &para));

        // 同一段落不再触发
        assert!(controller.on_mouse_move(&gateway, &bold, None).is_none());
        assert!(controller.on_key_down("Alt").is_none());

        controller.on_key_up("Alt");
        assert!(controller.on_key_down("Alt").is_some());
    }

    #[test]
    fn test_move_to_other_element_while_held() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let para = find_by_id(&dom.document, "para").unwrap();
        let other = find_by_id(&dom.document, "other").unwrap();

        controller.on_key_down("Alt");
        assert!(controller.on_mouse_move(&gateway, &para, None).is_some());
        let next = controller.on_mouse_move(&gateway, &other, None).unwrap();
        assert!(Rc::ptr_eq(&next, &other));
    }

    #[test]
    fn test_other_modifier_does_not_trigger() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let para = find_by_id(&dom.document, "para").unwrap();

        controller.on_mouse_move(&gateway, &para, None);
        assert!(controller.on_key_down("Shift").is_none());
        assert!(controller.on_key_down("a").is_none());
        assert!(controller.held().shift);
    }

    #[test]
    fn test_suppressed_while_editing() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let para = find_by_id(&dom.document, "para").unwrap();
        let field = find_by_id(&dom.document, "field").unwrap();

        controller.on_key_down("Alt");
        assert!(controller
            .on_mouse_move(&gateway, &para, Some(&field))
            .is_none());

        controller.on_focus_change(None);
        assert!(controller.on_mouse_move(&gateway, &para, None).is_some());
    }

    #[test]
    fn test_modifier_switch_triggers_without_move() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let para = find_by_id(&dom.document, "para").unwrap();

        controller.on_mouse_move(&gateway, &para, None);
        assert!(controller.on_key_down("Alt").is_some());

        controller.apply_settings(&PopupSettings {
            hotkey_modifier: Some(HotkeyModifier::Control),
            ..PopupSettings::default()
        });
        assert_eq!(controller.modifier(), HotkeyModifier::Control);
        let triggered = controller.on_key_down("Control").unwrap();
        assert!(Rc::ptr_eq(&triggered, &para));
    }

    #[test]
    fn test_in_flight_element_is_skipped() {
        let dom = page();
        let gateway = RcDomGateway::new();
        let controller = HoverController::default();
        let para = find_by_id(&dom.document, "para").unwrap();

        controller.in_flight().insert(&para);
        controller.on_mouse_move(&gateway, &para, None);
        assert!(controller.on_key_down("Alt").is_none());
    }
}
