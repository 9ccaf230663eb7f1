//! Body-to-HTML conversion: Markdown rendering and the plain-paragraph
//! fallback.

use pulldown_cmark::{html, Options, Parser};

/// Convert an extracted plain-text body to HTML.
///
/// With `markdownify` the text is treated as Markdown; otherwise it gets
/// the paragraph-wrapping transform.
pub fn render_body(text: &str, markdownify: bool) -> String {
    if markdownify {
        markdown_to_html(text)
    } else {
        paragraphs_to_html(text)
    }
}

/// Render Markdown to HTML with tables, footnotes and strikethrough enabled.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap plain text into HTML paragraphs.
///
/// Line endings are normalized to `\n`, blank lines delimit paragraphs,
/// and single newlines within a paragraph become `<br />`. Each paragraph
/// is emitted as `<p>…</p>` followed by a blank line.
pub fn paragraphs_to_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len() + 64);

    for paragraph in normalized.split("\n\n") {
        let paragraph = paragraph.trim_matches('\n');
        if paragraph.trim().is_empty() {
            continue;
        }
        out.push_str("<p>");
        out.push_str(&paragraph.replace('\n', "<br />\n"));
        out.push_str("</p>\n\n");
    }

    out
}
