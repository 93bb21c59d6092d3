use anyhow::Result;
use sqlx::SqlitePool;

/// Create every table codelens uses. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Raw source files, one row per loaded file
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS codebase_files (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            chunk_number INTEGER NOT NULL,
            chunk_content TEXT NOT NULL,
            hash TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(file_id, chunk_number),
            FOREIGN KEY (file_id) REFERENCES codebase_files(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Parsed model output, only for chunks whose response was valid JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id TEXT PRIMARY KEY,
            chunk_id TEXT NOT NULL,
            json_result TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_results_chunk_id ON analysis_results(chunk_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
