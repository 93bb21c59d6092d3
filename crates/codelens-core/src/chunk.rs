//! Recursive character chunker.
//!
//! Splits a source file into overlapping [`Chunk`]s of at most `chunk_size`
//! characters, preferring natural breakpoints. The text is split on the first
//! separator from [`SEPARATORS`] that occurs in it (blank line, newline,
//! space, then any character). Pieces that still exceed the budget are split
//! again with the remaining separators; small neighbouring pieces are merged
//! back together up to `chunk_size`, carrying up to `chunk_overlap`
//! characters of trailing context into the next chunk.
//!
//! Separators are kept at the start of the piece that follows them, so
//! joining the pieces of a chunk reproduces the original text exactly
//! (before the final whitespace trim). Lengths are counted in `char`s.
//!
//! # Example
//!
//! ```rust
//! use codelens_core::chunk::chunk_source;
//!
//! let chunks = chunk_source("file-1", "def f():\n    return 1\n", 2000, 200);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].sequence_number, 0);
//! assert!(!chunks[0].processed);
//! ```

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::models::Chunk;

/// Breakpoints in order of preference. The empty separator splits into
/// individual characters and always matches.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunk a file's content into [`Chunk`]s with contiguous sequence numbers
/// starting at 0.
///
/// Whitespace-only content produces no chunks.
pub fn chunk_source(
    file_id: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    split_text(text, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(i, content)| make_chunk(file_id, i as i64, content))
        .collect()
}

/// Split `text` into trimmed, non-empty pieces of at most `chunk_size`
/// characters (a single unsplittable character may exceed a budget of 0).
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut out = Vec::new();
    split_recursive(text, &SEPARATORS, chunk_size, chunk_overlap, &mut out);
    out
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
    out: &mut Vec<String>,
) {
    let (separator, remaining) = pick_separator(text, separators);
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            merge_pieces(&pending, chunk_size, chunk_overlap, out);
            pending.clear();
        }

        if remaining.is_empty() {
            out.push(piece.to_string());
        } else {
            split_recursive(piece, remaining, chunk_size, chunk_overlap, out);
        }
    }

    if !pending.is_empty() {
        merge_pieces(&pending, chunk_size, chunk_overlap, out);
    }
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, attaching each separator to the piece after it.
/// Empty pieces are dropped.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// Greedily pack pieces into chunks of at most `chunk_size` characters,
/// keeping up to `chunk_overlap` trailing characters as the start of the
/// next chunk.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize, out: &mut Vec<String>) {
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > chunk_size && !window.is_empty() {
            push_joined(&window, out);
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some(first) => total -= char_len(first),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    push_joined(&window, out);
}

fn push_joined(window: &VecDeque<&str>, out: &mut Vec<String>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(file_id: &str, index: i64, content: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        file_id: file_id.to_string(),
        sequence_number: index,
        content,
        hash,
        processed: false,
    }
}
