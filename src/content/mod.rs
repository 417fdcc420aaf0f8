//! Content module - view models, mappers and derived display fields

mod post;
pub mod reading_time;
pub mod richtext;

pub use post::{
    ContentBlock, Image, InlineSpan, Post, PostDocument, PostFields, PostSummary, RawContentBlock,
    RichTextSpan, SpanData,
};
pub use reading_time::reading_time;
