//! Utilities module - text processing shared by embedding and summarization

pub mod text_utils;

pub use text_utils::TextUtils;
