//! Maildir reader.
//!
//! A maildir container is a directory with `new/` and `cur/` subdirectories,
//! each holding one RFC 5322 message per file. Messages are visited from
//! `new/` first, then `cur/`, in lexicographic filename order within each
//! subdirectory, so a given container always yields the same sequence.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ArchiveError, Result};

/// A maildir container opened for sequential reading.
#[derive(Debug)]
pub struct MaildirArchive {
    path: PathBuf,
    entries: Vec<PathBuf>,
}

impl MaildirArchive {
    /// Open a maildir container.
    ///
    /// The path must be a directory with at least one of `new/` or `cur/`.
    /// The `tmp/` subdirectory holds messages still being delivered and is
    /// never read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArchiveError::NotFound(path.clone())
            } else {
                ArchiveError::io(&path, e)
            }
        })?;

        if !metadata.is_dir() {
            return Err(ArchiveError::unreadable(&path, "not a directory"));
        }

        let new_dir = path.join("new");
        let cur_dir = path.join("cur");
        if !new_dir.is_dir() && !cur_dir.is_dir() {
            return Err(ArchiveError::unreadable(
                &path,
                "no new/ or cur/ subdirectory, not a maildir",
            ));
        }

        let mut entries = Vec::new();
        for dir in [new_dir, cur_dir] {
            if dir.is_dir() {
                entries.extend(list_messages(&dir)?);
            }
        }

        Ok(Self { path, entries })
    }

    /// Path to the maildir container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of message files found.
    pub fn message_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Walk the container, calling `on_message` with the raw bytes of each
    /// message file. Files that cannot be read are skipped with a warning.
    ///
    /// The callback returns `true` to continue or `false` to stop early.
    /// `progress` (if given) receives `(messages_visited, message_count)`.
    ///
    /// Returns the number of messages visited.
    pub fn for_each_message(
        &self,
        on_message: &mut dyn FnMut(&[u8]) -> bool,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        let total = self.message_count();
        let mut count: u64 = 0;

        for entry in &self.entries {
            let raw = match std::fs::read(entry) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %entry.display(), error = %e, "skipping unreadable maildir entry");
                    continue;
                }
            };
            count += 1;
            let keep_going = on_message(&raw);
            if let Some(cb) = progress {
                cb(count, total);
            }
            if !keep_going {
                break;
            }
        }

        Ok(count)
    }
}

/// List message files in one maildir subdirectory, sorted by filename.
///
/// Dotfiles are not messages (the maildir format reserves them).
fn list_messages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let read_dir = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| ArchiveError::io(dir, e))?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
