//! Storage layer for the service
//!
//! Holds the in-memory document model, the file-backed store wrapping it,
//! and the atomic write helper used to flush it.

pub mod document;
pub mod json_document_store;
pub mod persist;
