//! 页面侧的桥接服务
//!
//! 注入后常驻在页面环境，用页面自己的翻译能力和独立的翻译器池处理请求。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BridgeAction, BridgeRequest, BridgeResponse, MessageChannel, PageMessage, PageWindow};
use crate::translation::capability::{AdapterResolver, TranslatorPool};
use crate::translation::error::{TranslationError, TranslationResult};

/// 页面侧桥接服务
pub struct PageBridgeHost {
    resolver: AdapterResolver,
    pool: TranslatorPool,
    adapter_wait: Duration,
    outbox: MessageChannel,
}

impl PageBridgeHost {
    /// 注入到页面并开始监听，返回后台任务句柄
    pub fn install(window: &PageWindow, adapter_wait: Duration) -> JoinHandle<()> {
        // 先订阅再启动任务，注入之后立刻发出的请求也能收到
        let inbox = window.subscribe();
        let host = Self {
            resolver: AdapterResolver::new(window.capability()),
            pool: TranslatorPool::new(),
            adapter_wait,
            outbox: window.channel(),
        };

        tokio::spawn(host.run(inbox))
    }

    /// 每个请求单独处理，慢的请求不会挡住后面的请求
    async fn run(self, mut inbox: mpsc::UnboundedReceiver<String>) {
        tracing::debug!("页面桥接已启动");
        let host = Arc::new(self);

        while let Some(raw) = inbox.recv().await {
            let Some(PageMessage::Request(request)) = PageMessage::parse(&raw) else {
                continue;
            };

            let host = host.clone();
            tokio::spawn(async move {
                let response = host.handle(request).await;
                host.reply(response);
            });
        }

        tracing::debug!("页面桥接已停止");
    }

    fn reply(&self, response: BridgeResponse) {
        match serde_json::to_string(&PageMessage::Response(response)) {
            Ok(raw) => {
                self.outbox.send(raw);
            }
            Err(e) => tracing::warn!(error = %e, "桥接应答序列化失败"),
        }
    }

    async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        let BridgeRequest {
            action,
            id,
            source,
            target,
            text,
        } = request;

        let outcome = match action {
            BridgeAction::Translate => self.translate(&text, &source, &target).await,
        };

        match outcome {
            Ok(result) => BridgeResponse::success(id, result),
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "页面桥接翻译失败");
                BridgeResponse::failure(id, e.message().to_string())
            }
        }
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> TranslationResult<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let factory = self.resolver.resolve(self.adapter_wait).await.ok_or_else(|| {
            TranslationError::CapabilityUnavailable("页面环境中没有可用的翻译能力".to_string())
        })?;

        let handle = self
            .pool
            .create_translator(factory.as_ref(), source, target, None)
            .await?;

        handle.translate(text.to_string()).await
    }
}
