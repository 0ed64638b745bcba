//! ComfyUI 模块包装

pub mod folder_paths;
