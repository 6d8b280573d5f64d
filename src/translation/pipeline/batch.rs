//! 批次翻译编排
//!
//! 按扫描顺序逐个翻译单元，每批结束后统一写回译文并让出执行权，长页面
//! 翻译期间页面仍然可以响应。
//!
//! ## 处理流程
//!
//! - **缓存优先**: 整段文本命中缓存时直接生成译文
//! - **流式输出**: 长文本且翻译器支持流式时，先插入占位元素再逐段写入
//! - **逐行翻译**: 其余文本按换行拆分，每行单独翻译并缓存，失败的行为空
//! - **批量写回**: 非流式译文在每批结束时统一插入
//!
//! 单个单元失败只影响它自己，不会中断整页翻译。

use markup5ever_rcdom::Handle;

use super::markers::{append_fragment, render_checked};
use super::scanner::{CaptureKind, TranslationUnit};
use super::streaming::{translate_line_with_streaming_support, LiveTranslation, TranslationRoute};
use crate::parsers::html::dom::{append_text, clear_children, create_attribute, create_element, set_node_attr};
use crate::parsers::html::gateway::DocumentGateway;
use crate::translation::config::constants;
use crate::translation::languages::is_rtl_language;
use crate::translation::storage::TranslationCache;

/// 批次执行结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    /// 写入了译文的单元
    pub translated: usize,
    /// 译文为空、没有写入的单元
    pub empty: usize,
    /// 元素已脱离文档或被取消的单元
    pub skipped: usize,
    /// 通过流式输出完成的单元
    pub streamed: usize,
    /// 整段命中缓存的单元
    pub cache_hits: usize,
}

/// 创建译文元素
pub fn build_output_span(target: &str) -> Handle {
    let mut attrs = vec![
        create_attribute("class", constants::OUTPUT_CLASS),
        create_attribute(constants::OUTPUT_ATTR, "1"),
        create_attribute("lang", target),
    ];
    if is_rtl_language(target) {
        attrs.push(create_attribute("dir", "rtl"));
    }
    create_element("span", attrs)
}

/// 按捕获方式插入译文：行内叶子插在后面，块级元素追加到末尾
pub fn insert_translation(
    gateway: &dyn DocumentGateway,
    unit: &TranslationUnit,
    output: Handle,
) -> bool {
    match unit.kind {
        CaptureKind::InlineLeaf => gateway.insert_after(&unit.element, output),
        CaptureKind::Block => {
            gateway.append_child(&unit.element, output);
            true
        }
    }
}

/// 把译文写入译文元素，有标记时还原链接和图片
pub fn fill_output(output: &Handle, unit: &TranslationUnit, translated: &str) {
    clear_children(output);
    match &unit.node_map {
        Some(node_map) => append_fragment(output, render_checked(translated, node_map)),
        None => append_text(output, translated),
    }
}

fn mark_done(unit: &TranslationUnit) {
    set_node_attr(&unit.element, constants::DONE_ATTR, Some("1".to_string()));
}

/// 批次编排器
pub struct BatchOrchestrator<'a> {
    gateway: &'a dyn DocumentGateway,
    cache: &'a TranslationCache,
    live: &'a LiveTranslation,
    batch_size: usize,
    streaming_threshold: usize,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        gateway: &'a dyn DocumentGateway,
        cache: &'a TranslationCache,
        live: &'a LiveTranslation,
    ) -> Self {
        Self {
            gateway,
            cache,
            live,
            batch_size: constants::BATCH_SIZE,
            streaming_threshold: constants::STREAMING_LENGTH_THRESHOLD,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_streaming_threshold(mut self, threshold: usize) -> Self {
        self.streaming_threshold = threshold;
        self
    }

    /// 依次翻译全部单元，每处理完一个单元回调 `(已完成, 总数)`
    pub async fn translate_blocks_sequentially(
        &self,
        units: Vec<TranslationUnit>,
        route: &TranslationRoute<'_>,
        source: &str,
        target: &str,
        on_progress: &mut (dyn FnMut(usize, usize) + '_),
    ) -> BatchReport {
        let total = units.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        let mut done = 0;

        tracing::info!(total, source, target, batch_size = self.batch_size, "开始批次翻译");

        for (batch_index, batch) in units.chunks(self.batch_size).enumerate() {
            let mut queued: Vec<(&TranslationUnit, Handle)> = Vec::new();

            for unit in batch {
                if let Some(output) = self
                    .translate_unit(unit, route, source, target, &mut report)
                    .await
                {
                    queued.push((unit, output));
                }
                done += 1;
                on_progress(done, total);
            }

            for (unit, output) in queued {
                if !self.gateway.is_attached(&unit.element) {
                    report.skipped += 1;
                    continue;
                }
                if insert_translation(self.gateway, unit, output) {
                    mark_done(unit);
                    report.translated += 1;
                } else {
                    report.skipped += 1;
                }
            }

            tracing::debug!(batch = batch_index, done, total, "批次完成");
            tokio::task::yield_now().await;
        }

        tracing::info!(
            translated = report.translated,
            empty = report.empty,
            skipped = report.skipped,
            streamed = report.streamed,
            cache_hits = report.cache_hits,
            "批次翻译结束"
        );
        report
    }

    /// 翻译单个单元，返回待插入的译文元素；流式单元直接写入页面，返回 `None`
    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        route: &TranslationRoute<'_>,
        source: &str,
        target: &str,
        report: &mut BatchReport,
    ) -> Option<Handle> {
        if !self.gateway.is_attached(&unit.element) {
            report.skipped += 1;
            return None;
        }

        if let Some(cached) = self.cache.get(&unit.text, source, target) {
            report.cache_hits += 1;
            return self.finish_output(unit, target, &cached, report);
        }

        if route.supports_streaming() && unit.text.chars().count() >= self.streaming_threshold {
            self.translate_streaming_unit(unit, route, source, target, report)
                .await;
            return None;
        }

        let mut lines = Vec::new();
        for line in unit.text.split('\n') {
            lines.push(self.translate_line(line, route, source, target).await);
        }

        self.finish_output(unit, target, &lines.join("\n"), report)
    }

    async fn translate_line(
        &self,
        line: &str,
        route: &TranslationRoute<'_>,
        source: &str,
        target: &str,
    ) -> String {
        if line.trim().is_empty() {
            return String::new();
        }

        if let Some(cached) = self.cache.get(line, source, target) {
            return cached;
        }

        match translate_line_with_streaming_support(
            route,
            line,
            self.streaming_threshold,
            &mut |_| {},
            None,
        )
        .await
        {
            Ok(result) => {
                if !result.text.trim().is_empty() {
                    self.cache.set(line, source, target, &result.text);
                }
                result.text
            }
            Err(e) => {
                tracing::debug!(error = %e, "单行翻译失败");
                String::new()
            }
        }
    }

    fn finish_output(
        &self,
        unit: &TranslationUnit,
        target: &str,
        translated: &str,
        report: &mut BatchReport,
    ) -> Option<Handle> {
        if translated.trim().is_empty() {
            report.empty += 1;
            return None;
        }

        let output = build_output_span(target);
        fill_output(&output, unit, translated);
        Some(output)
    }

    async fn translate_streaming_unit(
        &self,
        unit: &TranslationUnit,
        route: &TranslationRoute<'_>,
        source: &str,
        target: &str,
        report: &mut BatchReport,
    ) {
        let placeholder = build_output_span(target);
        if !insert_translation(self.gateway, unit, placeholder.clone()) {
            report.skipped += 1;
            return;
        }

        let reader = self.live.reader();
        let outcome = {
            let mut sink = |chunk: &str| append_text(&placeholder, chunk);
            translate_line_with_streaming_support(
                route,
                &unit.text,
                self.streaming_threshold,
                &mut sink,
                Some(&reader),
            )
            .await
        };

        match outcome {
            Ok(result) if result.cancelled => {
                self.gateway.remove(&placeholder);
                report.skipped += 1;
            }
            Ok(result) if !result.text.trim().is_empty() => {
                self.cache.set(&unit.text, source, target, &result.text);
                fill_output(&placeholder, unit, &result.text);
                mark_done(unit);
                report.translated += 1;
                if result.streamed {
                    report.streamed += 1;
                }
            }
            Ok(_) => {
                self.gateway.remove(&placeholder);
                report.empty += 1;
            }
            Err(e) => {
                tracing::debug!(error = %e, "流式单元翻译失败");
                self.gateway.remove(&placeholder);
                report.empty += 1;
            }
        }
    }
}
