//! Integration tests for archive normalization: mbox and maildir input,
//! date-based skipping, slug uniqueness, and body conversion.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use mboxpress::error::ArchiveError;
use mboxpress::normalize::{normalize, normalize_with_registry, NormalizeOptions};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn security_options() -> NormalizeOptions {
    NormalizeOptions::new("Security")
}

// ─── Date-based skipping ─────────────────────────────────────────────

#[test]
fn message_without_date_produces_no_document() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    assert_eq!(batch.messages_read, 3);
    assert_eq!(batch.converted(), 2, "the dateless message is skipped");
    assert_eq!(batch.messages_skipped, 1);
    assert!(
        !batch.documents.iter().any(|d| d.title.contains("no date")),
        "the skipped message must not appear in the output"
    );
}

// ─── Field normalization ─────────────────────────────────────────────

#[test]
fn first_message_fields() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    let doc = &batch.documents[0];

    assert_eq!(doc.title, "Hello World");
    assert_eq!(doc.author, "User One via email");
    assert_eq!(doc.category, "Security");
    assert_eq!(doc.date.to_rfc3339(), "2024-01-04T10:00:00+00:00");
    assert_eq!(doc.slug, "security/january-2024/hello-world");
    assert_eq!(doc.source_path, fixture("simple.mbox"));
}

#[test]
fn encoded_word_headers_are_decoded() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    let doc = &batch.documents[1];

    assert_eq!(doc.title, "Café con leña");
    assert_eq!(doc.author, "José García via email");
    // +0100 normalized to UTC
    assert_eq!(doc.date.to_rfc3339(), "2024-01-05T08:30:00+00:00");
}

#[test]
fn author_never_contains_the_raw_address() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    for doc in &batch.documents {
        assert!(
            !doc.author.contains('@') && !doc.author.contains('<'),
            "author leaked address parts: '{}'",
            doc.author
        );
    }
}

// ─── Body conversion ─────────────────────────────────────────────────

#[test]
fn plaintext_body_paragraph_roundtrip() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    assert_eq!(
        batch.documents[0].content,
        "<p>Hello</p>\n\n<p>World</p>\n\n"
    );
}

#[test]
fn multipart_html_part_wins_regardless_of_markdownify() {
    for markdownify in [false, true] {
        let options = NormalizeOptions {
            markdownify,
            ..security_options()
        };
        let batch = normalize(&fixture("simple.mbox"), &options).unwrap();
        let doc = &batch.documents[1];
        assert!(
            doc.content.contains("<p>the html body</p>"),
            "html part should be used verbatim (markdownify={markdownify})"
        );
        assert!(
            !doc.content.contains("plain fallback"),
            "plain part must lose to the html part"
        );
    }
}

#[test]
fn markdownify_renders_plaintext_as_markdown() {
    let options = NormalizeOptions {
        markdownify: true,
        ..security_options()
    };
    let batch = normalize(&fixture("simple.mbox"), &options).unwrap();
    // "Hello\n\nWorld" is two Markdown paragraphs
    let content = &batch.documents[0].content;
    assert!(content.contains("<p>Hello</p>"));
    assert!(content.contains("<p>World</p>"));
}

// ─── Slug uniqueness ─────────────────────────────────────────────────

#[test]
fn colliding_subjects_get_numbered_slugs() {
    let batch = normalize(&fixture("reports.mbox"), &security_options()).unwrap();
    let slugs: Vec<&str> = batch.documents.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(
        slugs,
        vec![
            "security/january-2024/report",
            "security/january-2024/report_2"
        ]
    );
}

#[test]
fn slugs_are_pairwise_distinct() {
    let batch = normalize(&fixture("reports.mbox"), &security_options()).unwrap();
    let unique: HashSet<&str> = batch.documents.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(unique.len(), batch.documents.len());
}

#[test]
fn shared_registry_extends_uniqueness_across_archives() {
    let mut seen = HashSet::new();
    let first =
        normalize_with_registry(&fixture("reports.mbox"), &security_options(), &mut seen, None)
            .unwrap();
    let second =
        normalize_with_registry(&fixture("reports.mbox"), &security_options(), &mut seen, None)
            .unwrap();

    let mut all: Vec<String> = first
        .documents
        .into_iter()
        .chain(second.documents)
        .map(|d| d.slug)
        .collect();
    assert_eq!(all.len(), 4);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 4, "shared registry keeps every slug distinct");
}

// ─── Archive-level failures ──────────────────────────────────────────

#[test]
fn missing_archive_yields_zero_documents_and_an_error() {
    let err = normalize(Path::new("/no/such/archive.mbox"), &security_options()).unwrap_err();
    assert!(matches!(err, ArchiveError::NotFound(_)));
}

#[test]
fn non_mailbox_file_is_unreadable() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "just a text file, not a mailbox").unwrap();
    let err = normalize(f.path(), &security_options()).unwrap_err();
    assert!(matches!(err, ArchiveError::Unreadable { .. }));
}

// ─── Maildir input ───────────────────────────────────────────────────

#[test]
fn maildir_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("new")).unwrap();
    std::fs::create_dir_all(tmp.path().join("cur")).unwrap();

    std::fs::write(
        tmp.path().join("new/1704362400.a.host"),
        b"From: Alpha <alpha@example.com>\n\
          Subject: Alpha post\n\
          Date: Thu, 04 Jan 2024 10:00:00 +0000\n\n\
          Alpha body\n",
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("cur/1704276000.b.host:2,S"),
        b"From: Beta <beta@example.com>\n\
          Subject: Beta post\n\
          Date: Wed, 03 Jan 2024 10:00:00 +0000\n\n\
          Beta body\n",
    )
    .unwrap();

    let batch = normalize(tmp.path(), &security_options()).unwrap();
    assert_eq!(batch.converted(), 2);

    // new/ is visited before cur/
    assert_eq!(batch.documents[0].title, "Alpha post");
    assert_eq!(batch.documents[1].title, "Beta post");
    assert_eq!(batch.documents[0].author, "Alpha via email");
    assert_eq!(
        batch.documents[0].slug,
        "security/january-2024/alpha-post"
    );
    assert_eq!(batch.documents[0].content, "<p>Alpha body</p>\n\n");
}

#[test]
fn directory_without_maildir_layout_is_unreadable() {
    let tmp = tempfile::tempdir().unwrap();
    let err = normalize(tmp.path(), &security_options()).unwrap_err();
    assert!(matches!(err, ArchiveError::Unreadable { .. }));
}

// ─── Configuration knobs ─────────────────────────────────────────────

#[test]
fn custom_author_suffix_is_applied() {
    let options = NormalizeOptions {
        author_suffix: "per mail".to_string(),
        ..security_options()
    };
    let batch = normalize(&fixture("simple.mbox"), &options).unwrap();
    assert_eq!(batch.documents[0].author, "User One per mail");
}

#[test]
fn documents_serialize_to_json() {
    let batch = normalize(&fixture("simple.mbox"), &security_options()).unwrap();
    let json = serde_json::to_string(&batch.documents).unwrap();
    assert!(json.contains("\"slug\":\"security/january-2024/hello-world\""));
    assert!(json.contains("\"category\":\"Security\""));
}
