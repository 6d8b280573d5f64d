//! 页面运行时
//!
//! 把一个文档上的翻译服务、设置、交互控制器和进度浮层串在一起，处理
//! 来自弹窗的运行时消息与页面上的键鼠事件。

use std::cell::RefCell;

use markup5ever_rcdom::Handle;
use tokio::sync::watch;

use crate::feedback::{CaretRect, FeedbackSurface, PageOverlay};
use crate::interaction::{EditableField, HoverController, KeyDisposition, TripleSpaceController};
use crate::translation::core::PageTranslation;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::messages::{MessageResponse, RuntimeMessage};
use crate::translation::settings::{PopupSettings, SettingsStore};
use crate::translation::storage::take_celebration_flag;
use crate::translation::TranslationService;

/// 页面运行时
pub struct ContentRuntime {
    document: Handle,
    service: TranslationService,
    settings: SettingsStore,
    settings_rx: RefCell<watch::Receiver<PopupSettings>>,
    hover: HoverController,
    triple_space: TripleSpaceController,
    overlay: PageOverlay,
}

impl ContentRuntime {
    pub fn new(document: Handle, service: TranslationService, settings: SettingsStore) -> Self {
        let settings_rx = settings.subscribe();
        let hover = HoverController::new(settings.current().hotkey());
        let overlay = PageOverlay::with_exit_delay(
            document.clone(),
            service.session().config().exit_animation(),
        );

        Self {
            document,
            service,
            settings,
            settings_rx: RefCell::new(settings_rx),
            hover,
            triple_space: TripleSpaceController::new(),
            overlay,
        }
    }

    pub fn document(&self) -> &Handle {
        &self.document
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn hover(&self) -> &HoverController {
        &self.hover
    }

    pub fn triple_space(&self) -> &TripleSpaceController {
        &self.triple_space
    }

    pub fn overlay(&self) -> &PageOverlay {
        &self.overlay
    }

    /// 应用设置存储中尚未处理的变化
    pub fn sync_settings(&self) -> bool {
        let mut rx = self.settings_rx.borrow_mut();
        match rx.has_changed() {
            Ok(true) => {
                let settings = rx.borrow_and_update().clone();
                self.hover.apply_settings(&settings);
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // 运行时消息
    // ========================================================================

    /// 处理一条运行时消息，需要回复时返回回复
    pub async fn handle_message(&self, message: RuntimeMessage) -> Option<MessageResponse> {
        tracing::debug!(kind = message.kind(), "收到运行时消息");

        match message {
            RuntimeMessage::TranslatePage { target_language } => {
                if let Err(e) = self.translate_page(&target_language).await {
                    tracing::warn!(error = %e, "页面翻译失败");
                }
                None
            }
            RuntimeMessage::UpdateHotkey { hotkey_modifier } => {
                self.settings.update_hotkey(hotkey_modifier).await;
                self.sync_settings();
                None
            }
            RuntimeMessage::TranslateText {
                text,
                source_language,
                target_language,
            } => {
                let response = match self
                    .service
                    .translate_text(
                        Some(&self.document),
                        &text,
                        source_language.as_deref(),
                        &target_language,
                        None,
                    )
                    .await
                {
                    Ok(translation) => {
                        MessageResponse::success(translation.text, Some(translation.detected_source))
                    }
                    Err(e) => MessageResponse::failure(&e),
                };
                Some(response)
            }
            RuntimeMessage::Prewarm {
                source_language,
                target_language,
            } => {
                if let Err(e) = self.service.prewarm(&source_language, &target_language).await {
                    tracing::debug!(error = %e, "预热失败");
                }
                None
            }
            RuntimeMessage::Ping => Some(MessageResponse::pong()),
        }
    }

    /// 处理 JSON 格式的消息，回复同样序列化为 JSON
    pub async fn handle_raw_message(&self, raw: &str) -> TranslationResult<Option<String>> {
        let message = RuntimeMessage::from_json(raw)?;
        match self.handle_message(message).await {
            Some(response) => serde_json::to_string(&response)
                .map(Some)
                .map_err(TranslationError::from),
            None => Ok(None),
        }
    }

    // ========================================================================
    // 页面翻译
    // ========================================================================

    /// 翻译整个页面，结束后收起浮层
    pub async fn translate_page(&self, target: &str) -> TranslationResult<PageTranslation> {
        let result = self
            .service
            .translate_page(&self.document, target, &self.overlay)
            .await;

        if result.is_ok() && take_celebration_flag(self.service.session().storage()).await {
            self.overlay.show("🎉 翻译完成");
        }

        self.overlay.dismiss().await;
        result
    }

    // ========================================================================
    // 键鼠事件
    // ========================================================================

    /// 鼠标移动，触发时翻译悬停的段落
    pub async fn on_mouse_move(&self, target: &Handle, focus: Option<&Handle>) -> bool {
        self.sync_settings();
        let triggered = self
            .hover
            .on_mouse_move(self.service.gateway(), target, focus);
        self.translate_hovered(triggered).await
    }

    pub async fn on_key_down(&self, key: &str) -> bool {
        self.sync_settings();
        let triggered = self.hover.on_key_down(key);
        self.translate_hovered(triggered).await
    }

    pub fn on_key_up(&self, key: &str) {
        self.hover.on_key_up(key);
    }

    async fn translate_hovered(&self, triggered: Option<Handle>) -> bool {
        let Some(element) = triggered else {
            return false;
        };
        let target = self.settings.current().target_language;

        self.hover
            .translate(&self.service, &self.document, &element, &target, None)
            .await
            .unwrap_or(false)
    }

    /// 输入框按键；三连空格时翻译整段输入并写回
    pub async fn on_field_key_down(
        &self,
        key: &str,
        field: &mut EditableField,
        caret: CaretRect,
    ) -> KeyDisposition {
        let disposition = self.triple_space.on_key_down(key, field);
        if disposition == KeyDisposition::Pass {
            return disposition;
        }

        let settings = self.settings.current();
        if let Err(e) = self
            .triple_space
            .translate_field(
                &self.service,
                &self.document,
                field,
                settings.input_target(),
                caret,
            )
            .await
        {
            tracing::debug!(error = %e, "输入框翻译失败");
        }
        disposition
    }

    /// 页面跳转
    pub fn on_navigation(&self) {
        self.service.session().reset();
        self.hover.on_blur();
    }
}
