//! 可逆文本消毒
//!
//! abstract 字段在持久化前做 HTML 实体转义，重新嵌入提示词前还原。
//! 转换必须可逆: unsanitize(sanitize(s)) == s

/// 转义 `& < > " '` 为 HTML 实体
pub fn sanitize(text: &str) -> String {
    html_escape::encode_safe(text).into_owned()
}

/// 还原 HTML 实体
pub fn unsanitize(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let original = r#"Prompt with <tags>, "quotes" & 'apostrophes'"#;
        let stored = sanitize(original);
        assert!(!stored.contains('<'));
        assert!(!stored.contains('"'));
        assert_eq!(unsanitize(&stored), original);
    }

    #[test]
    fn test_plain_text_unchanged() {
        let plain = "普通文本 without special characters";
        assert_eq!(sanitize(plain), plain);
        assert_eq!(unsanitize(plain), plain);
    }
}
