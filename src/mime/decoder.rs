//! Raw message → [`ParsedEmail`].
//!
//! Framing and header access come from `mailparse`; transfer decoding is
//! done here so that failures surface with the right severity:
//!
//! - base64 failure in a multipart part skips that part; in a single-part
//!   message it yields an empty body.
//! - a malformed quoted-printable escape aborts the whole message. Long
//!   lines, lowercase hex and bare LF line endings are accepted.
//!
//! Charset parameters are read but never applied; bodies are taken as UTF-8.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mailparse::body::Body;
use mailparse::{MailHeaderMap, ParsedContentType, ParsedMail};
use regex::Regex;
use tracing::{debug, info, warn};

use super::types::{AttachmentInfo, MediaCategory, ParsedEmail, TransferEncoding};
use crate::error::ParseError;

static MEDIA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9!#$&^_.+-]*/[a-z0-9][a-z0-9!#$&^_.+-]*$")
        .expect("media type pattern compiles")
});

/// Why a transfer-encoded body could not be decoded.
#[derive(Debug)]
enum BodyDecodeError {
    Base64(String),
    QuotedPrintable(String),
}

/// Decode a raw RFC 5322 message into its textual content.
pub fn decode(raw: &[u8]) -> Result<ParsedEmail, ParseError> {
    let mail = mailparse::parse_mail(raw).map_err(|e| ParseError::Message(e.to_string()))?;
    let headers = mail.get_headers();

    let content_type = headers
        .get_first_value("Content-Type")
        .ok_or(ParseError::MissingContentType)?;
    let ctype = parse_media_type(&content_type)
        .ok_or_else(|| ParseError::MalformedContentType(content_type.clone()))?;

    let mut email = ParsedEmail {
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        from: headers.get_first_value("From").unwrap_or_default(),
        to: headers.get_first_value("To").unwrap_or_default(),
        ..Default::default()
    };

    if ctype.mimetype.starts_with("multipart/") {
        if !ctype.params.contains_key("boundary") {
            return Err(ParseError::MissingBoundary(content_type));
        }
        if mail.subparts.is_empty() {
            warn!(content_type = %content_type, "Multipart message contains no parts");
        }
        for (index, part) in mail.subparts.iter().enumerate() {
            collect_part(&mut email, part, index)?;
        }
    } else {
        let encoding = TransferEncoding::from_header(
            headers.get_first_value("Content-Transfer-Encoding").as_deref(),
        );
        let body = match decode_body(&encoding, &raw_body(&mail)) {
            Ok(body) => body,
            Err(BodyDecodeError::Base64(e)) => {
                warn!(error = %e, "Failed to base64 decode single part body, treating as empty");
                Vec::new()
            }
            Err(BodyDecodeError::QuotedPrintable(e)) => return Err(ParseError::QuotedPrintable(e)),
        };
        route(&mut email, &ctype, attachment_name(&mail), body);
    }

    Ok(email)
}

/// Decode one direct child of a multipart container. Only quoted-printable
/// failure is fatal; every other problem skips the part.
fn collect_part(
    email: &mut ParsedEmail,
    part: &ParsedMail<'_>,
    index: usize,
) -> Result<(), ParseError> {
    let headers = part.get_headers();

    let Some(content_type) = headers.get_first_value("Content-Type") else {
        warn!(part = index, "Skipping part without Content-Type");
        return Ok(());
    };
    let Some(ctype) = parse_media_type(&content_type) else {
        warn!(part = index, content_type = %content_type, "Skipping part with malformed Content-Type");
        return Ok(());
    };

    let encoding = TransferEncoding::from_header(
        headers.get_first_value("Content-Transfer-Encoding").as_deref(),
    );
    let raw = raw_body(part);
    let body = match decode_body(&encoding, strip_delimiter_newline(&raw)) {
        Ok(body) => body,
        Err(BodyDecodeError::Base64(e)) => {
            warn!(part = index, error = %e, "Failed to base64 decode part, skipping");
            return Ok(());
        }
        Err(BodyDecodeError::QuotedPrintable(e)) => return Err(ParseError::QuotedPrintable(e)),
    };

    route(email, &ctype, attachment_name(part), body);
    Ok(())
}

/// Place decoded bytes into the record according to the part's category.
fn route(
    email: &mut ParsedEmail,
    ctype: &ParsedContentType,
    filename: Option<String>,
    body: Vec<u8>,
) {
    match MediaCategory::classify(&ctype.mimetype) {
        MediaCategory::TextPlain => {
            note_charset(ctype);
            email.plain_text = String::from_utf8_lossy(&body).into_owned();
        }
        MediaCategory::TextHtml => {
            note_charset(ctype);
            email.html = String::from_utf8_lossy(&body).into_owned();
        }
        MediaCategory::Application(_) => {
            info!(
                media_type = %ctype.mimetype,
                filename = filename.as_deref().unwrap_or(""),
                "Found attachment"
            );
            email.attachments.push(AttachmentInfo {
                media_type: ctype.mimetype.clone(),
                filename,
            });
        }
        MediaCategory::Unsupported(media_type) => {
            warn!(
                media_type = %media_type,
                filename = filename.as_deref().unwrap_or(""),
                "Ignoring unsupported part type"
            );
        }
    }
}

fn note_charset(ctype: &ParsedContentType) {
    let charset = ctype.charset.to_ascii_lowercase();
    if !matches!(charset.as_str(), "utf-8" | "utf8" | "us-ascii" | "") {
        debug!(charset = %charset, "Charset not applied, reading body as UTF-8");
    }
}

/// Parse a Content-Type value, rejecting anything whose media type is not
/// a `type/subtype` token pair.
fn parse_media_type(value: &str) -> Option<ParsedContentType> {
    let media_type = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if !MEDIA_TYPE.is_match(&media_type) {
        return None;
    }
    let mut ctype = mailparse::parse_content_type(value);
    ctype.mimetype = media_type;
    Some(ctype)
}

fn attachment_name(part: &ParsedMail<'_>) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
}

/// The part body exactly as transmitted, before any transfer decoding.
fn raw_body(part: &ParsedMail<'_>) -> Vec<u8> {
    match part.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

/// Drop the line break that belongs to the boundary delimiter following a
/// multipart child.
fn strip_delimiter_newline(raw: &[u8]) -> &[u8] {
    raw.strip_suffix(b"\r\n")
        .or_else(|| raw.strip_suffix(b"\n"))
        .unwrap_or(raw)
}

/// Check every `=` escape in a quoted-printable body. A trailing `=` (soft
/// line break) is fine; anything else must be followed by two hex digits.
fn check_qp_escapes(raw: &[u8]) -> Result<(), String> {
    for line in raw.split(|&b| b == b'\n') {
        let line = line.trim_ascii_end();
        let mut i = 0;
        while i < line.len() {
            if line[i] != b'=' {
                i += 1;
                continue;
            }
            if i + 1 == line.len() {
                break;
            }
            match line.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => {
                    let escape = &line[i..line.len().min(i + 3)];
                    return Err(format!(
                        "invalid escape sequence {:?}",
                        String::from_utf8_lossy(escape)
                    ));
                }
            }
        }
    }
    Ok(())
}

fn decode_body(encoding: &TransferEncoding, raw: &[u8]) -> Result<Vec<u8>, BodyDecodeError> {
    match encoding {
        TransferEncoding::Identity => Ok(raw.to_vec()),
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(compact)
                .map_err(|e| BodyDecodeError::Base64(e.to_string()))
        }
        TransferEncoding::QuotedPrintable => {
            check_qp_escapes(raw).map_err(BodyDecodeError::QuotedPrintable)?;
            quoted_printable::decode(raw, quoted_printable::ParseMode::Robust)
                .map_err(|e| BodyDecodeError::QuotedPrintable(e.to_string()))
        }
        TransferEncoding::Unrecognized(name) => {
            warn!(encoding = %name, "Unhandled Content-Transfer-Encoding, passing body through");
            Ok(raw.to_vec())
        }
    }
}
