//! Slug construction and the per-batch uniqueness registry.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Normalize a string into a slug segment: lowercased, punctuation
/// stripped, whitespace runs collapsed to single hyphens. Unicode letters
/// and digits are kept as-is, not transliterated.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
        // Remaining punctuation is dropped outright
    }

    out
}

/// The month-year slug segment for a date, e.g. `january-2024`.
///
/// `%B` formats English month names regardless of locale, which keeps
/// slugs stable across machines.
pub fn month_segment(date: &DateTime<Utc>) -> String {
    date.format("%B-%Y").to_string().to_lowercase()
}

/// Build the unique three-segment slug for a document and record it in
/// `seen`.
///
/// The slug is `<category>/<month-year>/<title>`, all segments normalized.
/// On collision the smallest suffix `_N` with N ≥ 2 that is still unused
/// is appended; first seen wins the bare name.
pub fn document_slug(
    category: &str,
    date: &DateTime<Utc>,
    title: &str,
    seen: &mut HashSet<String>,
) -> String {
    let base = format!(
        "{}/{}/{}",
        slugify(category),
        month_segment(date),
        slugify(title)
    );

    let slug = if seen.contains(&base) {
        let mut n = 2u64;
        loop {
            let candidate = format!("{base}_{n}");
            if !seen.contains(&candidate) {
                break candidate;
            }
            n += 1;
        }
    } else {
        base
    };

    seen.insert(slug.clone());
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("Security"), "security");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("under_score-dash"), "under-score-dash");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_unicode_lowercases() {
        assert_eq!(slugify("Café Münze"), "café-münze");
    }

    #[test]
    fn month_segment_is_english_and_lowercase() {
        assert_eq!(month_segment(&jan_2024()), "january-2024");
    }

    #[test]
    fn slug_three_segments() {
        let mut seen = HashSet::new();
        let slug = document_slug("Security", &jan_2024(), "Report", &mut seen);
        assert_eq!(slug, "security/january-2024/report");
    }

    #[test]
    fn slug_collisions_get_numeric_suffix() {
        let mut seen = HashSet::new();
        let first = document_slug("Security", &jan_2024(), "Report", &mut seen);
        let second = document_slug("Security", &jan_2024(), "Report", &mut seen);
        let third = document_slug("Security", &jan_2024(), "Report", &mut seen);
        assert_eq!(first, "security/january-2024/report");
        assert_eq!(second, "security/january-2024/report_2");
        assert_eq!(third, "security/january-2024/report_3");
    }

    #[test]
    fn slug_suffix_skips_taken_names() {
        let mut seen = HashSet::new();
        seen.insert("security/january-2024/report".to_string());
        seen.insert("security/january-2024/report_2".to_string());
        let slug = document_slug("Security", &jan_2024(), "Report", &mut seen);
        assert_eq!(slug, "security/january-2024/report_3");
    }
}
