//! MIME body extraction.
//!
//! Turns the raw bytes of an inbound email into a [`ParsedEmail`] holding
//! headers of interest plus the plain-text and HTML bodies.

pub mod decoder;
mod html;
pub mod types;

pub use decoder::decode;
pub use html::strip_html;
pub use types::{AttachmentInfo, MediaCategory, ParsedEmail, TransferEncoding};
