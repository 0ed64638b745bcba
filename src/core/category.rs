//! 节点分类

/// 表格
pub const CATEGORY_TABLE: &str = "RowFlow/Table";
/// 文本
pub const CATEGORY_TEXT: &str = "RowFlow/Text";
/// 逻辑
pub const CATEGORY_LOGIC: &str = "RowFlow/Logic";
/// 图片
pub const CATEGORY_IMAGE: &str = "RowFlow/Image";
/// 实用工具
pub const CATEGORY_UTILS: &str = "RowFlow/Utils";
