//! 回复解析
//!
//! 从模型的自由文本回复中提取 Title/Description/Style 三段

use lazy_static::lazy_static;
use regex::Regex;

use crate::record::GenerationRecord;

lazy_static! {
    // 标题行允许半角引号或弯引号包裹
    static ref TITLE_RE: Regex =
        Regex::new(r#"(?im)^\s*Title:\s*["“]?(.+?)["”]?\s*$"#).expect("valid title regex");
    static ref DESCRIPTION_RE: Regex =
        Regex::new(r"(?im)^\s*Description:\s*(.+)$").expect("valid description regex");
    static ref STYLE_RE: Regex =
        Regex::new(r"(?im)^\s*Style:\s*(.+)$").expect("valid style regex");
}

/// 提取记录
///
/// 三个标签一个都没找到, 或提取后全为空, 返回 None
pub fn parse_response(response: &str) -> Option<GenerationRecord> {
    let title = TITLE_RE
        .captures(response)
        .map(|c| c[1].trim().to_string());
    let description = DESCRIPTION_RE
        .captures(response)
        .map(|c| c[1].trim().to_string());
    let style = STYLE_RE
        .captures(response)
        .map(|c| c[1].trim().to_string());

    if title.is_none() && description.is_none() && style.is_none() {
        return None;
    }

    let title = title.unwrap_or_default();
    let description = description.unwrap_or_default();
    let style = style.unwrap_or_default();

    if title.is_empty() && description.is_empty() && style.is_empty() {
        return None;
    }

    Some(GenerationRecord {
        title,
        description,
        style,
    })
}

/// 解析失败时的兜底记录, 原始回复整段进入 description, 同样参与查重
pub fn fallback_record(response: &str) -> GenerationRecord {
    GenerationRecord {
        title: "UNPARSED".to_string(),
        description: response.to_string(),
        style: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_labeled_lines() {
        let record = parse_response("Title: Foo\nDescription: Bar\nStyle: Baz").unwrap();
        assert_eq!(record.title, "Foo");
        assert_eq!(record.description, "Bar");
        assert_eq!(record.style, "Baz");
    }

    #[test]
    fn test_labels_are_case_insensitive_and_quoted() {
        let record =
            parse_response("  title: \u{201c}Misty Harbor\u{201d}\nDESCRIPTION: boats at dawn\nstyle: cinematic")
                .unwrap();
        assert_eq!(record.title, "Misty Harbor");
        assert_eq!(record.description, "boats at dawn");
        assert_eq!(record.style, "cinematic");
    }

    #[test]
    fn test_partial_labels_still_parse() {
        let record = parse_response("Style: macro").unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.style, "macro");
    }

    #[test]
    fn test_crlf_line_endings() {
        let record = parse_response("Title: Foo\r\nDescription: Bar\r\nStyle: Baz").unwrap();
        assert_eq!(record.description, "Bar");
    }

    #[test]
    fn test_no_labels_yields_none() {
        assert!(parse_response("just some chatter").is_none());
    }

    #[test]
    fn test_fallback_keeps_full_response() {
        let record = fallback_record("just some chatter");
        assert_eq!(record.title, "UNPARSED");
        assert_eq!(record.description, "just some chatter");
        assert_eq!(record.style, "");
    }
}
