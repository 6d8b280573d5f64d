//! 翻译配置管理模块
//!
//! 默认值、配置文件、`.env` 与类型化环境变量按顺序叠加，最后统一校验。

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 语言默认值
    pub const DEFAULT_TARGET_LANGUAGE: &str = "zh-CN";
    pub const DEFAULT_INPUT_TARGET_LANGUAGE: &str = "en";
    pub const AUTO_SOURCE_LANGUAGE: &str = "auto";
    pub const FALLBACK_LANGUAGE: &str = "en";

    // 批次与流式
    pub const BATCH_SIZE: usize = 20;
    pub const STREAMING_LENGTH_THRESHOLD: usize = 500;

    // 文本阈值
    pub const MIN_TEXT_LENGTH: usize = 4;
    pub const MIN_HEADING_TEXT_LENGTH: usize = 2;
    pub const MIN_DIV_WORDS: usize = 3;

    // 计时
    pub const ADAPTER_POLL_INTERVAL: Duration = Duration::from_millis(150);
    pub const DEFAULT_ADAPTER_WAIT: Duration = Duration::from_millis(1500);
    pub const BRIDGE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const SKELETON_DELAY: Duration = Duration::from_millis(300);
    pub const HINT_DELAY: Duration = Duration::from_millis(400);
    pub const EXIT_ANIMATION: Duration = Duration::from_millis(150);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

    // DOM 标记
    pub const DONE_ATTR: &str = "data-native-translate-done";
    pub const OUTPUT_ATTR: &str = "data-native-translate-output";
    pub const OUTPUT_CLASS: &str = "native-translate-translation";
    pub const SEGMENT_ATTR: &str = "data-native-translate-segment";
    pub const PREPARED_ATTR: &str = "data-native-translate-prepared";
    pub const SKELETON_CLASS: &str = "native-translate-skeleton";
    pub const BRIDGE_MARKER_ID: &str = "native-translate-bridge";
    pub const OVERLAY_ID: &str = "native-translate-overlay";
    pub const INLINE_HINT_CLASS: &str = "native-translate-inline-hint";

    // 存储键
    pub const READY_PAIRS_KEY: &str = "nativeTranslate.readyPairs";
    pub const SETTINGS_KEY: &str = "nativeTranslate.settings";
    pub const CELEBRATION_KEY: &str = "NATIVE_TRANSLATE_EASTER_EGG_CONFETTI";

    /// 不包含可翻译正文的标签
    pub const SKIP_TAGS: &[&str] = &[
        "script", "style", "noscript", "template", "head", "meta", "link", "title",
        "img", "picture", "svg", "video", "audio", "canvas", "iframe", "object", "embed", "math",
        "input", "textarea", "select", "option", "optgroup",
        "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "colgroup", "col",
    ];

    /// 代码类标签，不作为捕获点也不抽取内容
    pub const CODE_TAGS: &[&str] = &["code", "pre", "kbd", "samp"];

    /// 强块级标签
    pub const STRONG_BLOCK_TAGS: &[&str] = &[
        "article", "section", "p", "li", "h1", "h2", "h3", "h4", "h5", "h6",
        "blockquote", "dd", "dt", "figcaption", "summary",
    ];

    pub const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

    /// 可以单独捕获的行内叶子标签
    pub const LEAF_INLINE_TAGS: &[&str] = &["span", "a", "button"];

    /// 导航区域内仍允许捕获的标签
    pub const CHROME_ALLOWED_TAGS: &[&str] = &["a", "button", "span", "li"];

    pub const CHROME_ROLES: &[&str] = &["navigation", "menu", "menubar", "toolbar"];

    /// 抽取时整体替换为占位标记的元素
    pub const VOID_MARKER_TAGS: &[&str] = &[
        "img", "picture", "svg", "video", "audio", "input", "code", "kbd", "samp", "math",
    ];

    /// 抽取时不贡献任何文本的元素
    pub const SILENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

    /// 预处理阶段处理的内容容器
    pub const CONTENT_CONTAINER_TAGS: &[&str] = &[
        "div", "section", "article", "main", "body", "blockquote", "li", "dd",
    ];

    /// 视为块级子元素的标签（用于识别零散行内内容）
    pub const BLOCK_LEVEL_TAGS: &[&str] = &[
        "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl",
        "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
        "h5", "h6", "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre",
        "section", "summary", "table", "ul",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "native-translate.toml",
        ".native-translate.toml",
        "~/.config/native-translate/config.toml",
        "/etc/native-translate/config.toml",
    ];
}

/// 检查是否存在配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
