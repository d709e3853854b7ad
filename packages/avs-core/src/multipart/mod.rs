//! `multipart/form-data` codec for the AVS wire format.
//!
//! AVS speaks a restricted dialect of `multipart/form-data`: exactly two
//! part names (`metadata`, `audio`), newline-terminated headers, and a
//! trailing `--boundary--`. This module only implements that dialect, not
//! general MIME multipart.

mod decode;
mod encode;

pub use decode::{decode, extract_boundary, find_frame};
pub use encode::encode;

use bytes::Bytes;
use serde_json::Value as JsonValue;

/// A decoded AVS message: zero or more JSON parts (directives, or a single
/// event+context envelope) and zero or more binary attachments (audio).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub content: Vec<JsonValue>,
    pub attachment: Vec<Bytes>,
}

impl Message {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.attachment.is_empty()
    }
}
