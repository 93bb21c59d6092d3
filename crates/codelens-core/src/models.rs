//! Core data models used throughout codelens.
//!
//! [`SourceFile`] and [`Chunk`] flow from the loader into the analyzer;
//! [`ChunkAnalysis`] is what the language model returns for one chunk;
//! [`MergedFileRecord`] and [`ProjectSummary`] are what the run writes to
//! `final_summary.json`.
//!
//! The analysis types are parsed from untrusted model output, so every field
//! is optional on the way in: a missing or `null` string becomes `""`, a
//! missing count becomes `0`, and a missing list becomes empty.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// A source file read from disk. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub filename: String,
    pub path: PathBuf,
    pub content: String,
}

/// A bounded piece of a [`SourceFile`]'s content.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub file_id: String,
    /// Zero-based, contiguous within a file.
    pub sequence_number: i64,
    pub content: String,
    pub hash: String,
    pub processed: bool,
}

/// Structured metadata the model extracts from one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub lines_of_code: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_imports: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classes: Vec<ClassRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<MethodRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub signature: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub complexity: Complexity,
}

/// Method complexity as reported by the model.
///
/// `level` is expected to be `Low`, `Medium` or `High`, but is kept verbatim
/// so an unexpected label does not discard the whole chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
}

/// The reconciled metadata for one source file across all of its chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedFileRecord {
    pub filename: String,
    pub description: String,
    pub lines_of_code: u64,
    pub key_imports: Vec<String>,
    pub classes: Vec<ClassRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub description: String,
    pub total_files_analyzed: usize,
}

/// The document written to `final_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub files: Vec<MergedFileRecord>,
    pub project_overview: ProjectOverview,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts an integer, a non-negative float, a numeric string or `null`.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
