//! Provides input functionality for serialized model documents.
//!
//! Model sources are JSON documents, optionally gzip-compressed. Compressed sources
//! are inflated into a temporary file that is removed once the model is parsed, so the
//! original source is never touched.

pub mod bundle;
