//! The normalized document record produced for every eligible message.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A mail message normalized into a publish-ready document.
///
/// Created once per eligible message and never mutated afterwards. Messages
/// without a parsable `Date` header never produce a document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedDocument {
    /// Decoded subject line, verbatim. Empty string when the header is absent.
    pub title: String,

    /// Cleaned `From` display name with the configured suffix appended.
    /// Never the raw header value: the email address and quote characters
    /// are stripped before the suffix is added.
    pub author: String,

    /// Timezone-aware message date. Naive parses are assumed UTC.
    pub date: DateTime<Utc>,

    /// Caller-supplied category label, applied to every document from
    /// one archive.
    pub category: String,

    /// Slug path: `<category>/<month-year>/<title>`, unique within the
    /// batch that produced it.
    pub slug: String,

    /// Body rendered to HTML.
    pub content: String,

    /// Path of the archive the message came from, kept for provenance.
    pub source_path: PathBuf,
}
