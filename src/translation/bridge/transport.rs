//! 扩展侧的桥接传输
//!
//! 负责把页面桥接注入一次、启动唯一的应答监听，并把每个请求的应答按 id
//! 交给等待中的调用方。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use markup5ever_rcdom::Handle;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{BridgeAction, BridgeRequest, BridgeResponse, PageBridgeHost, PageMessage, PageWindow};
use crate::parsers::html::dom::{
    append_child, create_attribute, create_element, find_by_id, get_body, get_child_node_by_name,
};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

type PendingMap = DashMap<String, oneshot::Sender<BridgeResponse>>;

/// 桥接传输
pub struct BridgeTransport {
    window: Arc<PageWindow>,
    pending: Arc<PendingMap>,
    listener_started: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    adapter_wait: Duration,
}

impl BridgeTransport {
    pub fn new(window: Arc<PageWindow>) -> Self {
        Self::with_timeouts(window, constants::BRIDGE_TIMEOUT, constants::DEFAULT_ADAPTER_WAIT)
    }

    /// `timeout` 为单个请求的等待上限，`adapter_wait` 为页面侧解析能力的等待上限
    pub fn with_timeouts(window: Arc<PageWindow>, timeout: Duration, adapter_wait: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(DashMap::new()),
            listener_started: AtomicBool::new(false),
            listener: Mutex::new(None),
            timeout,
            adapter_wait,
        }
    }

    pub fn window(&self) -> &Arc<PageWindow> {
        &self.window
    }

    /// 等待应答的请求数
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// 注入页面桥接，返回本次是否实际注入
    ///
    /// 全局标记或文档中的标记元素任一存在即视为已注入。
    pub fn ensure_bridge(&self, document: &Handle) -> bool {
        if self.window.bridge_installed() || find_by_id(document, constants::BRIDGE_MARKER_ID).is_some()
        {
            return false;
        }

        if self.window.mark_bridge_installed() {
            return false;
        }

        let task = PageBridgeHost::install(&self.window, self.adapter_wait);
        self.window.attach_bridge_task(task);
        insert_marker(document);

        tracing::debug!("页面桥接已注入");
        true
    }

    /// 启动应答监听，只会启动一次
    fn ensure_listener(&self) {
        if self.listener_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut inbox = self.window.subscribe();
        let pending = self.pending.clone();

        let task = tokio::spawn(async move {
            while let Some(raw) = inbox.recv().await {
                if let Some(PageMessage::Response(response)) = PageMessage::parse(&raw) {
                    if let Some((_, waiter)) = pending.remove(&response.id) {
                        let _ = waiter.send(response);
                    }
                }
            }
        });

        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(task);
        }
    }

    /// 通过页面桥接翻译文本
    pub async fn translate(
        &self,
        document: &Handle,
        text: &str,
        source: &str,
        target: &str,
    ) -> TranslationResult<String> {
        self.ensure_bridge(document);
        self.request(text, source, target).await
    }

    /// 发送请求并等待应答，调用前需要已注入桥接
    pub async fn request(&self, text: &str, source: &str, target: &str) -> TranslationResult<String> {
        self.ensure_listener();

        let id = next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let message = PageMessage::Request(BridgeRequest {
            action: BridgeAction::Translate,
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            text: text.to_string(),
        });

        if let Err(e) = self.window.post_message(&message) {
            self.pending.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                self.pending.remove(&id);
                return Err(TranslationError::BridgeError(
                    "桥接应答通道已关闭".to_string(),
                ));
            }
            Err(_) => {
                self.pending.remove(&id);
                tracing::warn!(id = %id, timeout_ms = self.timeout.as_millis() as u64, "桥接请求超时");
                return Err(TranslationError::BridgeTimeout(format!(
                    "桥接请求 {} 在 {}ms 内没有应答",
                    id,
                    self.timeout.as_millis()
                )));
            }
        };

        if response.ok {
            Ok(response.result.unwrap_or_default())
        } else {
            Err(TranslationError::BridgeError(
                response
                    .error
                    .unwrap_or_else(|| "页面桥接翻译失败".to_string()),
            ))
        }
    }
}

impl Drop for BridgeTransport {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

fn next_request_id() -> String {
    format!("nt-{:016x}", rand::rng().random::<u64>())
}

/// 插入 `<script id="native-translate-bridge">` 标记
fn insert_marker(document: &Handle) {
    let marker = create_element(
        "script",
        vec![
            create_attribute("id", constants::BRIDGE_MARKER_ID),
            create_attribute(constants::OUTPUT_ATTR, "1"),
        ],
    );

    let parent = get_child_node_by_name(document, "html")
        .and_then(|html| get_child_node_by_name(&html, "head"))
        .or_else(|| get_body(document));

    match parent {
        Some(parent) => append_child(&parent, marker),
        None => append_child(document, marker),
    }
}
