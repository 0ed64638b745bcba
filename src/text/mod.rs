//! 文本相关的节点

pub mod accumulate_text;
pub mod accumulate_text_numbered;
pub mod concatenate_text;
pub mod write_text;

pub use accumulate_text::AccumulateText;
pub use accumulate_text_numbered::AccumulateTextNumbered;
pub use concatenate_text::ConcatenateText;
pub use write_text::WriteText;
