//! Core data model types for normalized documents.

pub mod document;
