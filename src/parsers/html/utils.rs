/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 将连续空白折叠为单个空格（与浏览器渲染文本时的行为一致）
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;

    for c in text.chars() {
        if WHITESPACES.contains(&c) {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }

    out
}

/// 解析内联 style 属性，返回小写的 (属性, 值) 对
pub fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (key, value) = declaration.split_once(':')?;
            let key = key.trim().to_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_lowercase();
            if key.is_empty() {
                None
            } else {
                Some((key, value))
            }
        })
        .collect()
}
