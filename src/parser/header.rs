//! RFC 5322 header handling: unfolding, RFC 2047 encoded-words, and the
//! permissive `Date` parsing ladder.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

/// Extract the unfolded headers of a raw message as
/// `(lowercase_name, value)` pairs.
///
/// Accepts mbox-framed messages (the leading `From ` separator line is
/// skipped) as well as bare RFC 5322 messages.
pub fn message_headers(raw_message: &[u8]) -> Vec<(String, String)> {
    let bytes = skip_from_line(raw_message);
    let end = find_header_end(bytes).unwrap_or(bytes.len());
    let head = &bytes[..end];
    let text = match std::str::from_utf8(head) {
        Ok(s) => s.to_string(),
        // Not valid UTF-8; WINDOWS-1252 accepts every byte.
        Err(_) => encoding_rs::WINDOWS_1252.decode(head).0.into_owned(),
    };
    unfold_headers(&text)
}

/// First value for a header name (names are stored lowercased).
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Skip the `From ` separator line at the start of mbox messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    if !data.starts_with(b"From ") {
        return data;
    }
    match data.iter().position(|&b| b == b'\n') {
        Some(eol) => &data[eol + 1..],
        None => data,
    }
}

/// Byte offset where the headers end: the first blank line, tolerating a
/// stray `\r` between the two newlines.
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    let mut at = 0;
    while let Some(step) = data[at..].iter().position(|&b| b == b'\n') {
        let nl = at + step;
        match data.get(nl + 1) {
            Some(b'\n') => return Some(nl),
            Some(b'\r') if data.get(nl + 2) == Some(&b'\n') => return Some(nl),
            _ => {}
        }
        at = nl + 1;
    }
    None
}

/// Join folded continuation lines (leading space or tab) onto the previous
/// header and split each header at the first colon.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
        // a line with no colon outside a fold is not a header; dropped
    }

    headers
}

/// Decode RFC 2047 encoded-words (`=?charset?enc?payload?=`) in a header
/// value.
///
/// Tokens that fail to decode stay in the output verbatim. Whitespace
/// between two adjacent encoded words is dropped (RFC 2047 §6.2).
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut prev_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (plain, candidate) = rest.split_at(start);
        if !prev_was_word || !plain.trim().is_empty() {
            out.push_str(plain);
        }
        match decode_word(candidate) {
            Some((text, token_len)) => {
                out.push_str(&text);
                rest = &candidate[token_len..];
                prev_was_word = true;
            }
            None => {
                out.push_str("=?");
                rest = &candidate[2..];
                prev_was_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode one `=?charset?enc?payload?=` token at the start of `s`.
/// Returns the decoded text and the token's length in bytes.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let body_end = s.find("?=")?;
    let mut fields = s[2..body_end].splitn(3, '?');
    let charset = fields.next()?;
    let scheme = fields.next()?;
    let payload = fields.next()?;

    let bytes = if scheme.eq_ignore_ascii_case("B") {
        decode_b(payload)?
    } else if scheme.eq_ignore_ascii_case("Q") {
        decode_q(payload)
    } else {
        return None;
    };

    Some((charset_decode(charset, &bytes), body_end + 2))
}

/// B-encoding is base64, tolerating embedded whitespace and missing padding.
fn decode_b(payload: &str) -> Option<Vec<u8>> {
    let compact: String = payload.split_whitespace().collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(compact.as_bytes()))
        .ok()
}

/// Q-encoding: underscores become spaces, `=XX` becomes the byte `0xXX`.
/// Malformed escapes pass through as literal bytes.
fn decode_q(payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut bytes = payload.bytes();

    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => match (bytes.next(), bytes.next()) {
                (Some(hi), Some(lo)) => match hex_nibble(hi).zip(hex_nibble(lo)) {
                    Some((h, l)) => out.push((h << 4) | l),
                    None => {
                        out.push(b'=');
                        out.push(hi);
                        out.push(lo);
                    }
                },
                (Some(hi), None) => {
                    out.push(b'=');
                    out.push(hi);
                }
                _ => out.push(b'='),
            },
            other => out.push(other),
        }
    }

    out
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decode bytes under a charset label. An unknown label degrades to lossy
/// UTF-8 rather than losing the token.
fn charset_decode(label: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(label.trim().as_bytes()) {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => {
            warn!(charset = label, "unknown charset label in encoded-word");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Formats tried after the RFC 2822 / RFC 3339 fast paths, with the
/// day-of-week already stripped. Zoneless entries are taken as UTC.
const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parse an email `Date` header value.
///
/// Tries RFC 2822 and RFC 3339 first, then a list of common broken
/// variants (missing seconds, missing day-of-week, named timezones).
/// Returns `None` on failure; the caller then skips the message.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let bare = strip_weekday(value);
    if let Some(dt) = parse_with_formats(bare) {
        return Some(dt);
    }

    // A trailing named zone ("... 10:00:00 PST") gets its numeric offset
    // substituted before one more pass through the format list.
    if let Some(with_offset) = substitute_named_zone(bare) {
        if let Some(dt) = parse_with_formats(&with_offset) {
            return Some(dt);
        }
    }

    if let Some(dt) = date_via_mail_parser(value) {
        return Some(dt);
    }

    debug!(date = value, "unparsable date");
    None
}

fn parse_with_formats(value: &str) -> Option<DateTime<Utc>> {
    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Strip a leading day-of-week ("Thu, " or "Thu ").
fn strip_weekday(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            if let Some(rest) = rest.strip_prefix([',', ' ']) {
                return rest.trim_start();
            }
        }
    }
    s
}

/// Swap a trailing timezone abbreviation for its numeric offset.
fn substitute_named_zone(s: &str) -> Option<String> {
    let (head, zone) = s.rsplit_once(' ')?;
    let offset = match zone {
        "EST" => "-0500",
        "EDT" => "-0400",
        "CST" => "-0600",
        "CDT" => "-0500",
        "MST" => "-0700",
        "MDT" => "-0600",
        "PST" => "-0800",
        "PDT" => "-0700",
        "GMT" | "UTC" | "UT" => "+0000",
        "CET" => "+0100",
        "CEST" => "+0200",
        "JST" => "+0900",
        _ => return None,
    };
    Some(format!("{head} {offset}"))
}

/// Last resort: hand the value to `mail-parser`, which only exposes date
/// parsing through a full message.
fn date_via_mail_parser(value: &str) -> Option<DateTime<Utc>> {
    let framed = format!("Date: {value}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(framed.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    let dt = DateTime::parse_from_rfc3339(&rfc3339).ok()?;
    Some(dt.with_timezone(&Utc))
}
