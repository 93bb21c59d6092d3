//! Typed errors for problems with the caller's input.
//!
//! Everything else in the crate uses `anyhow`; these variants exist so the
//! HTTP layer can tell a bad request (400) from an internal failure (500)
//! by downcasting instead of matching on message text.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid GitHub URL format: {0}")]
    InvalidGithubUrl(String),

    #[error("Git clone failed: {0}")]
    CloneFailed(String),

    #[error("Subpath '{0}' does not exist in repo")]
    MissingSubpath(String),

    #[error("Subpath '{0}' points outside the repository")]
    SubpathOutsideRepo(String),

    #[error("Path '{}' does not exist", .0.display())]
    PathNotFound(PathBuf),
}

/// True when `err` (or anything in its chain) is an [`InputError`].
pub fn is_input_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<InputError>())
}
