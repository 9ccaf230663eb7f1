//! Mail archive parsing: mbox streaming reader, maildir reader, header
//! decoding, and MIME body extraction.

pub mod header;
pub mod maildir;
pub mod mbox;
pub mod mime;
