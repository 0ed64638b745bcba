//! 类型定义
//! 相关节点定义: ComfyUI/comfy/comfy_types/node_typing.py

pub const NODE_INT: &str = "INT";
pub const NODE_FLOAT: &str = "FLOAT";
pub const NODE_STRING: &str = "STRING";
pub const NODE_BOOLEAN: &str = "BOOLEAN";
pub const NODE_IMAGE: &str = "IMAGE";
pub const NODE_SEED: &str = "SEED";
pub const NODE_NUMBER: &str = "NUMBER";

pub const NODE_INT_MAX: u64 = 0xffffffffffffffffu64;
