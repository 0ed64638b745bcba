//! 图片相关的节点

pub mod save_images;

pub use save_images::SaveImages;
