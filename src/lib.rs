//! `mboxpress` — convert mail archives into publish-ready documents.
//!
//! This crate reads mbox files and maildir containers and normalizes each
//! message into a [`model::document::NormalizedDocument`]: cleaned author,
//! timezone-aware date, unique slug, and HTML content, ready for hand-off
//! to a page-rendering pipeline.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod render;
pub mod slug;
