//! Value types produced by the MIME decoder.

use serde::{Deserialize, Serialize};

use super::html::strip_html;

/// Textual content extracted from one raw email.
///
/// `plain_text` and `html` hold the last `text/plain` / `text/html` part
/// seen; both stay empty when the message has no such part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub plain_text: String,
    pub html: String,
    /// `application/*` parts observed. Payloads are not kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentInfo>,
}

impl ParsedEmail {
    /// Text to hand to the assistant: the plain-text body when it has any
    /// content, otherwise the HTML body with tags stripped.
    pub fn prompt_text(&self) -> Option<String> {
        if !self.plain_text.trim().is_empty() {
            return Some(self.plain_text.clone());
        }
        let stripped = strip_html(&self.html);
        (!stripped.is_empty()).then_some(stripped)
    }
}

/// An attachment seen while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub media_type: String,
    pub filename: Option<String>,
}

/// Routing category for a part, derived from its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCategory {
    TextPlain,
    TextHtml,
    /// `application/<subtype>`.
    Application(String),
    /// Anything else, carrying the full media type.
    Unsupported(String),
}

impl MediaCategory {
    /// Classify a lower-cased media type by prefix.
    pub fn classify(media_type: &str) -> Self {
        if media_type.starts_with("text/plain") {
            Self::TextPlain
        } else if media_type.starts_with("text/html") {
            Self::TextHtml
        } else if let Some(subtype) = media_type.strip_prefix("application/") {
            Self::Application(subtype.to_string())
        } else {
            Self::Unsupported(media_type.to_string())
        }
    }
}

/// `Content-Transfer-Encoding` of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    /// Absent, `7bit`, `8bit` or `binary`: bytes pass through unchanged.
    Identity,
    Base64,
    QuotedPrintable,
    /// Any other value. Bytes pass through unchanged.
    Unrecognized(String),
}

impl TransferEncoding {
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::Identity;
        };
        match value.to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "7bit" | "8bit" | "binary" => Self::Identity,
            _ => Self::Unrecognized(value.to_string()),
        }
    }
}
