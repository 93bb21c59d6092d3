//! Document store for one analysis run.
//!
//! Three collections mirror the pipeline stages: `codebase_files` (raw
//! source), `chunks` (with a `processed` flag that flips once the chunk's
//! analysis parsed), and `analysis_results` (the parsed JSON). Every run
//! starts with [`reset_collections`], so the store only ever describes the
//! most recent run. None of these writes are transactional across a run; a
//! crash leaves partial rows that the next reset removes.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use codelens_core::models::{Chunk, ChunkAnalysis, SourceFile};

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub file_path: String,
    pub file_content: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub file_id: String,
    pub chunk_number: i64,
    pub chunk_content: String,
    pub processed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredAnalysis {
    pub id: String,
    pub chunk_id: String,
    pub json_result: serde_json::Value,
    pub created_at: i64,
}

/// Every persisted row, as served by `GET /refresh_db`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionsDump {
    pub codebase_files: Vec<StoredFile>,
    pub chunks: Vec<StoredChunk>,
    pub analysis_results: Vec<StoredAnalysis>,
}

/// Empty the three run collections. The key-value cache is left alone.
pub async fn reset_collections(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM analysis_results")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM codebase_files")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Store a raw source file and return its generated ID.
pub async fn insert_file(pool: &SqlitePool, file: &SourceFile) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO codebase_files (id, filename, file_path, file_content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&file.filename)
    .bind(file.path.to_string_lossy().to_string())
    .bind(&file.content)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn insert_chunk(pool: &SqlitePool, chunk: &Chunk) -> Result<()> {
    sqlx::query(
        "INSERT INTO chunks (id, file_id, chunk_number, chunk_content, hash, processed) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&chunk.id)
    .bind(&chunk.file_id)
    .bind(chunk.sequence_number)
    .bind(&chunk.content)
    .bind(&chunk.hash)
    .bind(chunk.processed)
    .execute(pool)
    .await?;

    Ok(())
}

/// Store a chunk's parsed analysis and return its generated ID.
pub async fn insert_analysis(
    pool: &SqlitePool,
    chunk_id: &str,
    analysis: &ChunkAnalysis,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO analysis_results (id, chunk_id, json_result, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(chunk_id)
    .bind(serde_json::to_string(analysis)?)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn mark_chunk_processed(pool: &SqlitePool, chunk_id: &str) -> Result<()> {
    sqlx::query("UPDATE chunks SET processed = 1 WHERE id = ?")
        .bind(chunk_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn dump_collections(pool: &SqlitePool) -> Result<CollectionsDump> {
    let file_rows = sqlx::query(
        "SELECT id, filename, file_path, file_content, created_at FROM codebase_files ORDER BY created_at, file_path",
    )
    .fetch_all(pool)
    .await?;

    let chunk_rows = sqlx::query(
        "SELECT id, file_id, chunk_number, chunk_content, processed FROM chunks ORDER BY file_id, chunk_number",
    )
    .fetch_all(pool)
    .await?;

    let analysis_rows = sqlx::query(
        "SELECT id, chunk_id, json_result, created_at FROM analysis_results ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    let codebase_files = file_rows
        .iter()
        .map(|row| StoredFile {
            id: row.get("id"),
            filename: row.get("filename"),
            file_path: row.get("file_path"),
            file_content: row.get("file_content"),
            created_at: row.get("created_at"),
        })
        .collect();

    let chunks = chunk_rows
        .iter()
        .map(|row| StoredChunk {
            id: row.get("id"),
            file_id: row.get("file_id"),
            chunk_number: row.get("chunk_number"),
            chunk_content: row.get("chunk_content"),
            processed: row.get::<i64, _>("processed") != 0,
        })
        .collect();

    let mut analysis_results = Vec::with_capacity(analysis_rows.len());
    for row in &analysis_rows {
        let raw: String = row.get("json_result");
        analysis_results.push(StoredAnalysis {
            id: row.get("id"),
            chunk_id: row.get("chunk_id"),
            json_result: serde_json::from_str(&raw)?,
            created_at: row.get("created_at"),
        });
    }

    Ok(CollectionsDump {
        codebase_files,
        chunks,
        analysis_results,
    })
}
