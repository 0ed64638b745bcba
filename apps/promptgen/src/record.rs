//! 生成记录

use serde::Serialize;

/// 一条生成结果
///
/// 三个字段全部相等才算重复, 不做大小写/空白归一化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Style")]
    pub style: String,
}

impl GenerationRecord {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            style: style.into(),
        }
    }
}
