//! The message normalizer: turns a mail archive into an ordered batch of
//! [`NormalizedDocument`] records.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::model::document::NormalizedDocument;
use crate::parser::header;
use crate::parser::maildir::MaildirArchive;
use crate::parser::mbox::MboxArchive;
use crate::parser::mime::{self, ExtractedBody};
use crate::render;
use crate::slug;

/// Per-archive normalization options.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Category label applied to every document from this archive.
    pub category: String,
    /// Appended (after one space) to every derived author name, so
    /// mail-derived authors cannot collide with other author records in
    /// the destination corpus.
    pub author_suffix: String,
    /// Treat plaintext bodies as Markdown instead of paragraph-wrapping.
    pub markdownify: bool,
}

impl NormalizeOptions {
    /// Options with the given category and the default suffix `"via email"`.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            author_suffix: "via email".to_string(),
            markdownify: false,
        }
    }
}

/// The result of normalizing one archive.
#[derive(Debug)]
pub struct NormalizedBatch {
    /// Documents in the archive's native message order.
    pub documents: Vec<NormalizedDocument>,
    /// Messages visited in the archive.
    pub messages_read: u64,
    /// Messages that produced no document (missing date, no usable body).
    pub messages_skipped: u64,
}

impl NormalizedBatch {
    /// Number of messages converted into documents.
    pub fn converted(&self) -> u64 {
        self.documents.len() as u64
    }
}

/// Progress callback: `(work_done, work_total)` — bytes for mbox archives,
/// message counts for maildirs.
pub type ProgressFn<'a> = &'a dyn Fn(u64, u64);

/// Normalize one archive with a fresh slug registry.
///
/// Fails only at the archive-open boundary (missing path, not a valid
/// mbox/maildir); individual malformed messages are skipped silently.
pub fn normalize(archive_path: &Path, options: &NormalizeOptions) -> Result<NormalizedBatch> {
    let mut seen_slugs = HashSet::new();
    normalize_with_registry(archive_path, options, &mut seen_slugs, None)
}

/// Normalize one archive against a caller-owned slug registry.
///
/// Sharing one registry across several calls makes slugs unique across the
/// combined output; a fresh registry per call (what [`normalize`] does)
/// scopes uniqueness to a single archive, and cross-archive collisions are
/// then the caller's concern.
pub fn normalize_with_registry(
    archive_path: &Path,
    options: &NormalizeOptions,
    seen_slugs: &mut HashSet<String>,
    progress: Option<ProgressFn<'_>>,
) -> Result<NormalizedBatch> {
    let mut documents: Vec<NormalizedDocument> = Vec::new();
    let mut skipped: u64 = 0;

    let is_dir = std::fs::metadata(archive_path)
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let mut handle = |raw: &[u8]| -> bool {
        match normalize_message(raw, archive_path, options, seen_slugs) {
            Some(doc) => documents.push(doc),
            None => skipped += 1,
        }
        true
    };

    let read = if is_dir {
        MaildirArchive::open(archive_path)?.for_each_message(&mut handle, progress)?
    } else {
        MboxArchive::open(archive_path)?.for_each_message(&mut handle, progress)?
    };

    info!(
        path = %archive_path.display(),
        category = %options.category,
        read,
        converted = documents.len(),
        skipped,
        "archive normalized"
    );

    Ok(NormalizedBatch {
        documents,
        messages_read: read,
        messages_skipped: skipped,
    })
}

/// Normalize a single raw message. Returns `None` when the message is
/// skipped (unparsable date or no usable body part).
fn normalize_message(
    raw: &[u8],
    source_path: &Path,
    options: &NormalizeOptions,
    seen_slugs: &mut HashSet<String>,
) -> Option<NormalizedDocument> {
    let headers = header::message_headers(raw);

    let date_raw = header::get_header(&headers, "date");
    let date = match date_raw.and_then(header::parse_date) {
        Some(d) => d,
        None => {
            debug!(
                path = %source_path.display(),
                date = date_raw.unwrap_or("<missing>"),
                "skipping message without usable date"
            );
            return None;
        }
    };

    let title = header::get_header(&headers, "subject")
        .map(header::decode_encoded_words)
        .unwrap_or_default();

    let from = header::get_header(&headers, "from").map(header::decode_encoded_words);
    let author = clean_author(from.as_deref(), &options.author_suffix);

    let content = match mime::extract_body(raw) {
        Some(ExtractedBody::Html(html)) => html,
        Some(ExtractedBody::Plain(text)) => render::render_body(&text, options.markdownify),
        None => {
            debug!(
                path = %source_path.display(),
                subject = %title,
                "skipping message without a text/plain or text/html part"
            );
            return None;
        }
    };

    let slug = slug::document_slug(&options.category, &date, &title, seen_slugs);

    Some(NormalizedDocument {
        title,
        author,
        date,
        category: options.category.clone(),
        slug,
        content,
        source_path: source_path.to_path_buf(),
    })
}

/// Derive the author name from a decoded `From` header value.
///
/// A missing or empty header yields `"Unknown"`. The angle-bracketed email
/// address and any quote characters are stripped from the display name, and
/// the suffix is appended after a single space. The append is unconditional:
/// feeding an already-suffixed name back in doubles the suffix, matching the
/// behavior of the tool this was derived from.
pub fn clean_author(raw_from: Option<&str>, suffix: &str) -> String {
    let mut name = match raw_from.map(str::trim) {
        Some(s) if !s.is_empty() => {
            let display = match s.find('<') {
                Some(pos) => &s[..pos],
                None => s,
            };
            strip_quote_chars(display).trim().to_string()
        }
        _ => String::new(),
    };

    if name.is_empty() {
        name = "Unknown".to_string();
    }

    if suffix.is_empty() {
        name
    } else {
        format!("{name} {suffix}")
    }
}

/// Remove straight and curly quote characters.
///
/// Straight apostrophes are kept: they appear inside legitimate names
/// ("O'Brien") far more often than as quoting.
fn strip_quote_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}'))
        .collect()
}
