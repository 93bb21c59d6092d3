//! # codelens core
//!
//! I/O-free logic shared by the `codelens` binary and server: data models,
//! the recursive text chunker, the chunk-analysis merger, and the local
//! project summarizer.
//!
//! This crate contains no tokio, sqlx, filesystem or network access. Apart
//! from generated chunk IDs, every function here is deterministic for
//! identical inputs.

pub mod chunk;
pub mod merge;
pub mod models;
pub mod summary;
