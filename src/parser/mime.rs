//! MIME body extraction: first-level part selection and charset fallbacks.

use mail_parser::{Message, MessagePart, MessagePartId, MessageParser, MimeHeaders, PartType};

use crate::parser::header::{find_header_end, skip_from_line};

/// The usable body found in a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedBody {
    /// Plain text, still to be run through the HTML conversion step.
    Plain(String),
    /// A `text/html` part, used verbatim as the document content.
    Html(String),
}

/// Extract the body of a raw message (mbox-framed or bare RFC 5322).
///
/// - Single-part message: the decoded payload, as [`ExtractedBody::Plain`].
///   Even a single-part `text/html` body takes this path: only multipart
///   messages get the verbatim-HTML treatment.
/// - Multipart message: scans the immediate child parts only — nested
///   multipart structures are deliberately not descended into. The last
///   `text/plain` and the last `text/html` child win; HTML is preferred.
/// - Returns `None` when the message has no usable text part; the caller
///   skips it.
pub fn extract_body(raw_message: &[u8]) -> Option<ExtractedBody> {
    let bytes = skip_from_line(raw_message);
    let parser = MessageParser::default();

    match parser.parse(bytes) {
        Some(msg) => {
            let root = msg.part(0)?;
            match &root.body {
                PartType::Multipart(children) => select_from_parts(&msg, children),
                PartType::Text(text) => Some(ExtractedBody::Plain(text.clone().into_owned())),
                PartType::Html(html) => Some(ExtractedBody::Plain(html.clone().into_owned())),
                PartType::Binary(data) | PartType::InlineBinary(data) => Some(
                    ExtractedBody::Plain(decode_declared_charset(root, data.as_ref())),
                ),
                PartType::Message(_) => None,
            }
        }
        // mail-parser could not make sense of the message; salvage the
        // bytes after the header block as plain text.
        None => extract_body_fallback(bytes),
    }
}

/// Linear scan over the immediate children of a multipart root.
fn select_from_parts(msg: &Message<'_>, children: &[MessagePartId]) -> Option<ExtractedBody> {
    let mut plain: Option<String> = None;
    let mut html: Option<String> = None;

    for &id in children {
        let Some(part) = msg.part(id) else { continue };
        match &part.body {
            PartType::Text(text) if is_plain_text(part) => {
                plain = Some(text.clone().into_owned());
            }
            PartType::Html(body) => {
                html = Some(body.clone().into_owned());
            }
            _ => {}
        }
    }

    html.map(ExtractedBody::Html)
        .or(plain.map(ExtractedBody::Plain))
}

/// A text part counts as `text/plain` when it has no Content-Type header
/// (RFC 2045 default) or declares `text/plain` explicitly.
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .map(|s| s.eq_ignore_ascii_case("plain"))
                    .unwrap_or(true)
        }
    }
}

/// Decode a binary payload using its declared charset.
///
/// Undecodable bytes are replaced rather than failing; an undeclared or
/// unknown charset falls back to WINDOWS-1252, which accepts every byte.
fn decode_declared_charset(part: &MessagePart<'_>, data: &[u8]) -> String {
    let declared = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .unwrap_or("");
    let encoding = encoding_rs::Encoding::for_label(declared.as_bytes())
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (decoded, _, _) = encoding.decode(data);
    decoded.into_owned()
}

/// Fallback when `mail-parser` cannot parse the message at all: treat
/// everything after the first blank line as the plain-text body.
fn extract_body_fallback(bytes: &[u8]) -> Option<ExtractedBody> {
    let header_end = find_header_end(bytes)?;
    let body = &bytes[header_end..];
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(body);
    let text = decoded.trim_start_matches(['\r', '\n']).to_string();
    if text.trim().is_empty() {
        None
    } else {
        Some(ExtractedBody::Plain(text))
    }
}
