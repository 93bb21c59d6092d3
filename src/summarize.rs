//! Project overview generation.
//!
//! The `local` strategy is the term-frequency summary from
//! [`codelens_core::summary`]. The `llm` strategy asks the model for a short
//! purpose statement and falls back to a fixed description when the call
//! fails or comes back empty. Neither strategy returns an error.

use codelens_core::models::{MergedFileRecord, ProjectOverview};
use codelens_core::summary::{
    build_purpose_prompt, overview_with, summarize_locally, EMPTY_PROJECT_DESCRIPTION,
    MODEL_FALLBACK_DESCRIPTION,
};

use crate::analyzer::{ChunkAnalyzer, TokenUsage};
use crate::config::SummaryConfig;

pub async fn summarize(
    records: &[MergedFileRecord],
    config: &SummaryConfig,
    analyzer: &dyn ChunkAnalyzer,
) -> (ProjectOverview, TokenUsage) {
    match config.strategy.as_str() {
        "llm" => summarize_with_model(records, analyzer).await,
        _ => (summarize_locally(records), TokenUsage::default()),
    }
}

async fn summarize_with_model(
    records: &[MergedFileRecord],
    analyzer: &dyn ChunkAnalyzer,
) -> (ProjectOverview, TokenUsage) {
    if records.is_empty() {
        return (
            overview_with(records, EMPTY_PROJECT_DESCRIPTION.to_string()),
            TokenUsage::default(),
        );
    }

    match analyzer.complete(&build_purpose_prompt(records)).await {
        Ok(response) => {
            let text = response.text.trim();
            let description = if text.is_empty() {
                tracing::warn!("model returned an empty project purpose");
                MODEL_FALLBACK_DESCRIPTION.to_string()
            } else {
                text.to_string()
            };
            (overview_with(records, description), response.usage)
        }
        Err(e) => {
            tracing::warn!(error = %e, "project purpose generation failed");
            (
                overview_with(records, MODEL_FALLBACK_DESCRIPTION.to_string()),
                TokenUsage::default(),
            )
        }
    }
}
