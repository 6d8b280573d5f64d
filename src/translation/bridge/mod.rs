//! 页面桥接
//!
//! 扩展环境拿不到翻译能力时，把请求转发到页面环境执行。两侧通过
//! [`PageWindow`] 上的消息通道交换 JSON 消息，请求带随机 id，应答按 id 配对。

pub mod host;
pub mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::capability::CapabilityHost;
use super::error::TranslationResult;

pub use host::PageBridgeHost;
pub use transport::BridgeTransport;

/// 桥接请求的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeAction {
    Translate,
}

/// `{action:"translate", id, source, target, text}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub action: BridgeAction,
    pub id: String,
    pub source: String,
    pub target: String,
    pub text: String,
}

/// `{id, ok, result?, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn success(id: String, result: String) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: String, error: String) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// 页面消息通道上传递的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel")]
pub enum PageMessage {
    #[serde(rename = "native-translate:request")]
    Request(BridgeRequest),
    #[serde(rename = "native-translate:response")]
    Response(BridgeResponse),
}

impl PageMessage {
    /// 页面上还有其他脚本在发消息，解析失败的直接忽略
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// 页面级消息通道
///
/// 每个监听者持有一条无界队列，消息按发送顺序送达，不会因为监听者处理
/// 得慢而丢失。监听者关闭后在下一次发送时移除。
#[derive(Debug, Clone, Default)]
pub struct MessageChannel {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
}

impl MessageChannel {
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    /// 发给当前所有监听者，返回送达的数量
    pub fn send(&self, raw: String) -> usize {
        let Ok(mut listeners) = self.listeners.lock() else {
            return 0;
        };
        listeners.retain(|tx| tx.send(raw.clone()).is_ok());
        listeners.len()
    }
}

/// 页面环境
///
/// 持有页面可见的翻译能力和页面级消息通道。桥接是否已注入由全局标记记录。
pub struct PageWindow {
    capability: Arc<dyn CapabilityHost>,
    channel: MessageChannel,
    bridge_installed: AtomicBool,
    bridge_task: Mutex<Option<JoinHandle<()>>>,
}

impl PageWindow {
    pub fn new(capability: Arc<dyn CapabilityHost>) -> Self {
        Self {
            capability,
            channel: MessageChannel::default(),
            bridge_installed: AtomicBool::new(false),
            bridge_task: Mutex::new(None),
        }
    }

    pub fn capability(&self) -> Arc<dyn CapabilityHost> {
        self.capability.clone()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        self.channel.subscribe()
    }

    pub(crate) fn channel(&self) -> MessageChannel {
        self.channel.clone()
    }

    /// 发送原始消息，没有监听者时消息丢弃
    pub fn post_raw(&self, raw: String) {
        self.channel.send(raw);
    }

    pub fn post_message(&self, message: &PageMessage) -> TranslationResult<()> {
        self.post_raw(serde_json::to_string(message)?);
        Ok(())
    }

    pub fn bridge_installed(&self) -> bool {
        self.bridge_installed.load(Ordering::SeqCst)
    }

    /// 设置全局标记，返回之前是否已设置
    pub(crate) fn mark_bridge_installed(&self) -> bool {
        self.bridge_installed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn attach_bridge_task(&self, task: JoinHandle<()>) {
        if let Ok(mut slot) = self.bridge_task.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }
}

impl Drop for PageWindow {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.bridge_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}
