//! 支持的语言列表与语言代码工具

use serde::Serialize;

/// 支持的语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupportedLanguage {
    pub code: &'static str,
    pub label: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[SupportedLanguage] = &[
    SupportedLanguage { code: "en", label: "English" },
    SupportedLanguage { code: "zh-CN", label: "简体中文" },
    SupportedLanguage { code: "zh-TW", label: "繁體中文" },
    SupportedLanguage { code: "ja", label: "日本語" },
    SupportedLanguage { code: "ko", label: "한국어" },
    SupportedLanguage { code: "fr", label: "Français" },
    SupportedLanguage { code: "de", label: "Deutsch" },
    SupportedLanguage { code: "es", label: "Español" },
    SupportedLanguage { code: "it", label: "Italiano" },
    SupportedLanguage { code: "pt", label: "Português" },
    SupportedLanguage { code: "ru", label: "Русский" },
    SupportedLanguage { code: "ar", label: "العربية" },
    SupportedLanguage { code: "hi", label: "हिन्दी" },
    SupportedLanguage { code: "bn", label: "বাংলা" },
    SupportedLanguage { code: "id", label: "Bahasa Indonesia" },
    SupportedLanguage { code: "tr", label: "Türkçe" },
    SupportedLanguage { code: "vi", label: "Tiếng Việt" },
    SupportedLanguage { code: "th", label: "ไทย" },
    SupportedLanguage { code: "nl", label: "Nederlands" },
    SupportedLanguage { code: "pl", label: "Polski" },
    SupportedLanguage { code: "fa", label: "فارسی" },
    SupportedLanguage { code: "ur", label: "اردو" },
    SupportedLanguage { code: "uk", label: "Українська" },
    SupportedLanguage { code: "sv", label: "Svenska" },
    SupportedLanguage { code: "fil", label: "Filipino" },
];

const RTL_PREFIXES: &[&str] = &["ar", "he", "fa", "ur", "ps"];

/// 按代码查找支持的语言（大小写不敏感）
pub fn find_language(code: &str) -> Option<&'static SupportedLanguage> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| lang.code.eq_ignore_ascii_case(code))
}

/// 主语言子标签，小写
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// 主语言子标签相同即视为同一种语言（`en` 与 `en-US`）
pub fn is_same_language(a: &str, b: &str) -> bool {
    let a = primary_subtag(a);
    !a.is_empty() && a == primary_subtag(b)
}

/// 判断语言是否从右向左书写
pub fn is_rtl_language(code: &str) -> bool {
    let lc = code.trim().to_lowercase();
    if lc.is_empty() {
        return false;
    }
    RTL_PREFIXES
        .iter()
        .any(|prefix| lc == *prefix || lc.starts_with(&format!("{}-", prefix)))
}

/// 转换为 DeepLX 接口使用的语言代码
pub fn to_deeplx_code(code: &str) -> String {
    if code.eq_ignore_ascii_case("auto") {
        return "auto".to_string();
    }
    match code.to_lowercase().as_str() {
        "zh-tw" | "zh-hk" | "zh-hant" => "ZH-HANT".to_string(),
        "zh-cn" | "zh" | "zh-hans" => "ZH".to_string(),
        "pt" | "pt-br" => "PT-BR".to_string(),
        "en" => "EN".to_string(),
        _ => primary_subtag(code).to_uppercase(),
    }
}

/// 把 DeepLX 返回的语言代码还原为 BCP 47 形式
pub fn from_deeplx_code(code: &str) -> String {
    match code.to_uppercase().as_str() {
        "ZH" | "ZH-HANS" => "zh-CN".to_string(),
        "ZH-HANT" => "zh-TW".to_string(),
        other => primary_subtag(other),
    }
}
