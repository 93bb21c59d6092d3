//! Analysis pipeline orchestration.
//!
//! Coordinates one run: load → store raw file → chunk → analyze → parse →
//! merge → summarize → write `final_summary.json`. Chunk-level failures
//! (model errors, unparseable responses) are logged and skipped; store and
//! filesystem errors abort the run.
//!
//! [`analyze_input`] wraps a run with the response cache and input
//! resolution and is what both the CLI and `POST /analyze` call. All runs
//! and clears on one [`AnalysisContext`] are serialized by its run lock,
//! since each run starts by emptying the shared collections.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use codelens_core::chunk::chunk_source;
use codelens_core::merge::merge_results_by_filename;
use codelens_core::models::{ChunkAnalysis, ProjectSummary};
use codelens_core::summary::build_project_summary;

use crate::analyzer::{parse_analysis, ChunkAnalyzer, TokenUsage};
use crate::cache::{self, CacheEntry, KvCache, SqliteKvCache};
use crate::config::Config;
use crate::db;
use crate::github;
use crate::loader;
use crate::migrate;
use crate::store;
use crate::summarize::summarize;

/// Name of the summary file written at the root of the analyzed directory.
pub const OUTPUT_FILENAME: &str = "final_summary.json";

/// Shared state for analysis runs: configuration, store, and cache.
pub struct AnalysisContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub cache: Arc<dyn KvCache>,
    run_lock: Mutex<()>,
}

impl AnalysisContext {
    pub fn new(config: Config, pool: SqlitePool, cache: Arc<dyn KvCache>) -> Self {
        Self {
            config,
            pool,
            cache,
            run_lock: Mutex::new(()),
        }
    }

    /// Connect to the configured database, create the schema if needed,
    /// and cache responses in the same database.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::run_migrations(&pool).await?;
        let cache: Arc<dyn KvCache> = Arc::new(SqliteKvCache::new(pool.clone()));
        Ok(Self::new(config, pool, cache))
    }
}

/// Result of a single uncached run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub output_path: PathBuf,
    pub summary: ProjectSummary,
    pub usage: TokenUsage,
    pub chunks_total: usize,
    pub chunks_parsed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeStatus {
    Cached,
    Complete,
}

impl AnalyzeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzeStatus::Cached => "cached",
            AnalyzeStatus::Complete => "complete",
        }
    }
}

/// What `POST /analyze` returns.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutcome {
    pub status: AnalyzeStatus,
    pub json_path: String,
    pub json_data: ProjectSummary,
}

/// Analyze a local directory or GitHub URL, consulting the cache first.
///
/// With `use_cache = false` the lookup is skipped but the fresh result
/// still replaces the cached entry.
pub async fn analyze_input(
    ctx: &AnalysisContext,
    input: &str,
    analyzer: &dyn ChunkAnalyzer,
    use_cache: bool,
) -> Result<AnalyzeOutcome> {
    let _guard = ctx.run_lock.lock().await;

    if use_cache {
        if let Some(entry) = cache::get_entry(ctx.cache.as_ref(), input).await? {
            tracing::info!(input, "returning cached analysis");
            return Ok(AnalyzeOutcome {
                status: AnalyzeStatus::Cached,
                json_path: entry.json_path,
                json_data: entry.json_data,
            });
        }
    }

    let project_path = github::resolve_input(input, &ctx.config.clone).await?;
    let run = execute_run(ctx, &project_path, analyzer).await?;

    let entry = CacheEntry {
        json_path: run.output_path.display().to_string(),
        json_data: run.summary,
    };
    cache::put_entry(ctx.cache.as_ref(), input, &entry).await?;

    Ok(AnalyzeOutcome {
        status: AnalyzeStatus::Complete,
        json_path: entry.json_path,
        json_data: entry.json_data,
    })
}

/// Run the full pipeline over `project_path`, bypassing the cache.
pub async fn run_analysis(
    ctx: &AnalysisContext,
    project_path: &Path,
    analyzer: &dyn ChunkAnalyzer,
) -> Result<AnalysisRun> {
    let _guard = ctx.run_lock.lock().await;
    execute_run(ctx, project_path, analyzer).await
}

/// Empty the run collections and the response cache.
pub async fn clear_all(ctx: &AnalysisContext) -> Result<()> {
    let _guard = ctx.run_lock.lock().await;
    store::reset_collections(&ctx.pool).await?;
    ctx.cache.clear().await?;
    tracing::info!("cleared collections and cache");
    Ok(())
}

async fn execute_run(
    ctx: &AnalysisContext,
    project_path: &Path,
    analyzer: &dyn ChunkAnalyzer,
) -> Result<AnalysisRun> {
    let pool = &ctx.pool;
    let chunking = &ctx.config.chunking;

    store::reset_collections(pool).await?;

    let files = loader::load_code_files(project_path, &ctx.config.loader)?;

    let mut usage = TokenUsage::default();
    let mut analyses: Vec<ChunkAnalysis> = Vec::new();
    let mut chunks_total = 0;

    for file in &files {
        let file_id = store::insert_file(pool, file).await?;
        let chunks = chunk_source(
            &file_id,
            &file.content,
            chunking.chunk_size,
            chunking.chunk_overlap,
        );

        for chunk in &chunks {
            chunks_total += 1;
            store::insert_chunk(pool, chunk).await?;

            let response = match analyzer.analyze(&file.filename, &chunk.content).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        file = %file.filename,
                        chunk = chunk.sequence_number,
                        error = %e,
                        "chunk analysis failed"
                    );
                    continue;
                }
            };
            usage.add(response.usage);
            tracing::info!(
                file = %file.filename,
                chunk = chunk.sequence_number,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "chunk analyzed"
            );

            let mut analysis = match parse_analysis(&response.text) {
                Ok(analysis) => analysis,
                Err(e) => {
                    tracing::warn!(
                        file = %file.filename,
                        chunk = chunk.sequence_number,
                        error = %e,
                        "discarding unparseable analysis"
                    );
                    continue;
                }
            };
            if analysis.filename.trim().is_empty() {
                analysis.filename = file.filename.clone();
            }

            store::insert_analysis(pool, &chunk.id, &analysis).await?;
            store::mark_chunk_processed(pool, &chunk.id).await?;
            analyses.push(analysis);
        }
    }

    let chunks_parsed = analyses.len();
    let merged = merge_results_by_filename(analyses);

    let (overview, summary_usage) = summarize(&merged, &ctx.config.summary, analyzer).await;
    usage.add(summary_usage);

    let summary = build_project_summary(merged, overview);
    let output_path = project_path.join(OUTPUT_FILENAME);
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(&output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    tracing::info!(
        path = %output_path.display(),
        files = summary.files.len(),
        chunks_total,
        chunks_parsed,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "analysis complete"
    );

    Ok(AnalysisRun {
        output_path,
        summary,
        usage,
        chunks_total,
        chunks_parsed,
    })
}
