//! Language-model access for chunk analysis.
//!
//! The [`ChunkAnalyzer`] trait is the seam between the pipeline and the
//! model. Every call returns the raw response text together with the
//! [`TokenUsage`] it consumed; callers add usage into their own
//! accumulator.
//!
//! # Providers
//!
//! | Config Value | Analyzer |
//! |-------------|----------|
//! | `"disabled"` | [`DisabledAnalyzer`] |
//! | `"openai"` | [`OpenAiAnalyzer`] |
//!
//! Responses are untrusted. [`parse_analysis`] strips a surrounding Markdown
//! code fence via [`extract_json`] and only accepts a JSON object.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use codelens_core::models::ChunkAnalysis;

use crate::config::LlmConfig;

/// Prompt and completion tokens reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChunkAnalyzer: Send + Sync {
    /// Ask the model to describe one chunk of `filename` as JSON.
    async fn analyze(&self, filename: &str, chunk: &str) -> Result<ModelResponse> {
        self.complete(&build_chunk_prompt(filename, chunk)).await
    }

    /// Send a free-form prompt and return the model's reply.
    async fn complete(&self, prompt: &str) -> Result<ModelResponse>;
}

/// Build the fixed chunk-analysis prompt.
pub fn build_chunk_prompt(filename: &str, code: &str) -> String {
    format!(
        r#"You are an expert AI code analyzer. Analyze the following source code and extract structured metadata.
Output must be strictly in valid JSON format with no extra text. Follow this structure:

{{
  "filename": "{filename}",
  "description": "Brief description of what this file or class does",
  "lines_of_code": <number of lines in the full code>,
  "key_imports": ["..."],
  "classes": [
    {{
      "name": "ClassName",
      "annotations": ["..."],
      "description": "What the class does",
      "methods": [
        {{
          "signature": "full method signature",
          "description": "what the method does",
          "complexity": {{
            "level": "Low | Medium | High"
          }}
        }}
      ]
    }}
  ]
}}

Only include the actual content inside the JSON brackets. Do not explain anything outside it.

Code:
{code}
"#
    )
}

/// Strip a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````)
/// and whitespace. Text without a fence is returned trimmed.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model response into a [`ChunkAnalysis`].
///
/// Fails unless the (fence-stripped) text is a JSON object whose fields
/// have the expected shapes.
pub fn parse_analysis(text: &str) -> Result<ChunkAnalysis> {
    let value: serde_json::Value = serde_json::from_str(extract_json(text))?;
    if !value.is_object() {
        bail!("expected a JSON object, got {}", json_kind(&value));
    }
    Ok(serde_json::from_value(value)?)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============ Disabled ============

/// Fails every call. Useful offline: every chunk is then skipped.
pub struct DisabledAnalyzer;

#[async_trait]
impl ChunkAnalyzer for DisabledAnalyzer {
    async fn complete(&self, _prompt: &str) -> Result<ModelResponse> {
        bail!("Language model is disabled. Set [llm] provider = \"openai\" in config.")
    }
}

// ============ OpenAI ============

/// OpenAI chat-completions client. One request per call, no retry.
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiAnalyzer {
    /// Reads the API key from `OPENAI_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChunkAnalyzer for OpenAiAnalyzer {
    async fn complete(&self, prompt: &str) -> Result<ModelResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` and `usage` from a chat response.
fn parse_chat_response(json: &serde_json::Value) -> Result<ModelResponse> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

    let count = |field: &str| {
        json.get("usage")
            .and_then(|u| u.get(field))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };

    Ok(ModelResponse {
        text: text.to_string(),
        usage: TokenUsage {
            prompt_tokens: count("prompt_tokens"),
            completion_tokens: count("completion_tokens"),
        },
    })
}

/// Create the configured analyzer.
pub fn create_analyzer(config: &LlmConfig) -> Result<Arc<dyn ChunkAnalyzer>> {
    if !config.is_enabled() {
        return Ok(Arc::new(DisabledAnalyzer));
    }
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiAnalyzer::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(extract_json("not json"), "not json");
        assert_eq!(extract_json("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(extract_json("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_analysis_accepts_fenced_object() {
        let text = "```json\n{\"filename\": \"A.java\", \"lines_of_code\": \"12\", \"key_imports\": [\"x\"]}\n```";
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.filename, "A.java");
        assert_eq!(analysis.lines_of_code, 12);
        assert_eq!(analysis.key_imports, vec!["x"]);
        assert!(analysis.classes.is_empty());
    }

    #[test]
    fn test_parse_analysis_rejects_non_objects() {
        assert!(parse_analysis("Error: rate limited").is_err());
        assert!(parse_analysis("[1, 2]").is_err());
        assert!(parse_analysis("\"just a string\"").is_err());
        assert!(parse_analysis("{\"filename\": \"A\", ").is_err());
    }

    #[test]
    fn test_chunk_prompt_contains_filename_and_code() {
        let prompt = build_chunk_prompt("Main.java", "class Main {}");
        assert!(prompt.contains("\"filename\": \"Main.java\""));
        assert!(prompt.ends_with("Code:\nclass Main {}\n"));
        assert!(prompt.contains("strictly in valid JSON"));
    }

    #[test]
    fn test_token_usage_add() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 3,
        });
        total.add(TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 2,
        });
        assert_eq!(total.prompt_tokens, 15);
        assert_eq!(total.completion_tokens, 5);
        assert_eq!(total.total(), 20);
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{}" } }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7 }
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.text, "{}");
        assert_eq!(resp.usage.prompt_tokens, 42);
        assert_eq!(resp.usage.completion_tokens, 7);

        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn test_disabled_analyzer_fails() {
        let err = DisabledAnalyzer.analyze("a.py", "x = 1").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_create_analyzer_unknown_provider() {
        let config = LlmConfig {
            provider: "llama".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_analyzer(&config).is_err());
    }

    #[tokio::test]
    async fn test_create_analyzer_disabled() {
        let config = LlmConfig {
            provider: "disabled".to_string(),
            ..LlmConfig::default()
        };
        assert!(!config.is_enabled());
        let analyzer = create_analyzer(&config).unwrap();
        let err = analyzer.complete("hello").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_openai_analyzer_against_local_server() {
        async fn completions(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            let reply = if prompt.contains("\"filename\": \"a.py\"") {
                "{\"filename\": \"a.py\"}"
            } else {
                "unexpected"
            };
            Json(serde_json::json!({
                "choices": [{ "message": { "content": reply } }],
                "usage": { "prompt_tokens": 100, "completion_tokens": 9 }
            }))
        }

        let app = Router::new().route("/v1/chat/completions", post(completions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = LlmConfig {
            api_base: format!("http://{}/v1/", addr),
            ..LlmConfig::default()
        };
        let analyzer = OpenAiAnalyzer::with_api_key(&config, "test-key").unwrap();
        let resp = analyzer.analyze("a.py", "x = 1").await.unwrap();
        assert_eq!(parse_analysis(&resp.text).unwrap().filename, "a.py");
        assert_eq!(resp.usage.total(), 109);
    }
}
