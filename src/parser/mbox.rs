//! Streaming mbox reader.
//!
//! Reads mbox files line-by-line without loading the whole file into
//! memory, invoking a callback for every message in file order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ArchiveError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// How many bytes to process between progress reports.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// An mbox file opened for sequential reading.
///
/// The reader is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
#[derive(Debug)]
pub struct MboxArchive {
    path: PathBuf,
    file_size: u64,
}

impl MboxArchive {
    /// Open an mbox file, verifying that it exists and looks like an mbox.
    ///
    /// A non-empty file whose first non-blank line is not a `From `
    /// separator is rejected as unreadable. An empty file is a valid mbox
    /// containing zero messages.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArchiveError::NotFound(path.clone())
            } else {
                ArchiveError::io(&path, e)
            }
        })?;

        if metadata.is_dir() {
            return Err(ArchiveError::unreadable(&path, "is a directory, not an mbox file"));
        }

        let archive = Self {
            path,
            file_size: metadata.len(),
        };
        archive.validate()?;
        Ok(archive)
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the mbox file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that the first non-blank line is an mbox `From ` separator.
    fn validate(&self) -> Result<()> {
        if self.file_size == 0 {
            return Ok(());
        }
        let file = File::open(&self.path).map_err(|e| ArchiveError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(8 * 1024, file);
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            if read_line(&mut reader, &mut line).map_err(|e| ArchiveError::io(&self.path, e))? == 0 {
                return Ok(()); // only blank lines
            }
            if is_blank_line(&line) {
                continue;
            }
            if is_mbox_separator(&line) {
                return Ok(());
            }
            return Err(ArchiveError::unreadable(
                &self.path,
                "first line is not an mbox 'From ' separator",
            ));
        }
    }

    /// Walk the full mbox, calling `on_message` with the raw bytes of each
    /// message (including its `From ` separator line) in file order.
    ///
    /// The callback returns `true` to continue or `false` to stop early.
    /// `progress` (if given) receives `(bytes_read, file_size)` periodically.
    ///
    /// Returns the number of messages visited.
    pub fn for_each_message(
        &self,
        on_message: &mut dyn FnMut(&[u8]) -> bool,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| ArchiveError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut bytes_read: u64 = 0;
        let mut last_progress: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4 * 1024);
        let mut prev_line_was_empty = true;
        let mut first_line = true;

        loop {
            line_buf.clear();
            let line_len = read_line(&mut reader, &mut line_buf)
                .map_err(|e| ArchiveError::io(&self.path, e))? as u64;
            if line_len == 0 {
                break; // EOF
            }

            let is_from_line = is_mbox_separator(&line_buf);

            if is_from_line && (first_line || prev_line_was_empty) {
                if !message_buf.is_empty() {
                    count += 1;
                    if !on_message(&message_buf) {
                        return Ok(count);
                    }
                }
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if is_from_line {
                warn!(
                    offset = bytes_read,
                    "found 'From ' separator without preceding blank line"
                );
                if !message_buf.is_empty() {
                    count += 1;
                    if !on_message(&message_buf) {
                        return Ok(count);
                    }
                }
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if !message_buf.is_empty() {
                message_buf.extend_from_slice(&line_buf);
            }
            // Lines before the first separator belong to no message and
            // are dropped (validation only allows blank lines there).

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            bytes_read += line_len;

            if let Some(cb) = progress {
                if bytes_read - last_progress >= PROGRESS_INTERVAL {
                    cb(bytes_read, self.file_size);
                    last_progress = bytes_read;
                }
            }
        }

        // Flush the last message
        if !message_buf.is_empty() {
            count += 1;
            on_message(&message_buf);
        }

        if let Some(cb) = progress {
            cb(self.file_size, self.file_size);
        }

        Ok(count)
    }
}

/// Read one line (including its newline) into `out`. Returns bytes consumed.
fn read_line<R: BufRead>(reader: &mut R, out: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut consumed = 0;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(consumed);
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                out.extend_from_slice(&buf[..=pos]);
                reader.consume(pos + 1);
                return Ok(consumed + pos + 1);
            }
            None => {
                let len = buf.len();
                out.extend_from_slice(buf);
                reader.consume(len);
                consumed += len;
            }
        }
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = if line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f
    }

    #[test]
    fn separator_detection() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n")); // lowercase
        assert!(!is_mbox_separator(b">From user@example.com\n")); // escaped
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn separator_detection_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn blank_line_detection() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn splits_messages_in_order() {
        let mbox = b"From a@example.com Thu Jan 01 00:00:00 2024\n\
            Subject: one\n\nbody one\n\n\
            From b@example.com Thu Jan 02 00:00:00 2024\n\
            Subject: two\n\nbody two\n";
        let f = write_temp(mbox);
        let archive = MboxArchive::open(f.path()).unwrap();

        let mut subjects = Vec::new();
        let count = archive
            .for_each_message(
                &mut |raw| {
                    let text = String::from_utf8_lossy(raw);
                    let subject = text
                        .lines()
                        .find(|l| l.starts_with("Subject:"))
                        .unwrap()
                        .to_string();
                    subjects.push(subject);
                    true
                },
                None,
            )
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(subjects, vec!["Subject: one", "Subject: two"]);
    }

    #[test]
    fn escaped_from_is_not_a_boundary() {
        let mbox = b"From a@example.com Thu Jan 01 00:00:00 2024\n\
            Subject: one\n\n>From the body, not a separator\nmore body\n";
        let f = write_temp(mbox);
        let archive = MboxArchive::open(f.path()).unwrap();
        let mut count = 0;
        archive
            .for_each_message(
                &mut |_raw| {
                    count += 1;
                    true
                },
                None,
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn leading_blank_lines_are_not_a_message() {
        let mbox = b"\n\n\
            From a@example.com Thu Jan 01 00:00:00 2024\n\
            Subject: one\n\nbody\n";
        let f = write_temp(mbox);
        let archive = MboxArchive::open(f.path()).unwrap();

        let mut seen = Vec::new();
        let count = archive
            .for_each_message(
                &mut |raw| {
                    seen.push(String::from_utf8_lossy(raw).into_owned());
                    true
                },
                None,
            )
            .unwrap();

        assert_eq!(count, 1, "blank preamble must not count as a message");
        assert!(seen[0].starts_with("From a@example.com"));
    }

    #[test]
    fn empty_file_is_a_valid_empty_mbox() {
        let f = write_temp(b"");
        let archive = MboxArchive::open(f.path()).unwrap();
        let count = archive.for_each_message(&mut |_| true, None).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn non_mbox_file_is_unreadable() {
        let f = write_temp(b"this is just some text\nnot a mailbox\n");
        let err = MboxArchive::open(f.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Unreadable { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = MboxArchive::open("/no/such/file.mbox").unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }
}
