//! Generative-AI helpers: stat inference from diary text and short
//! encouraging comments.
//!
//! The model itself sits behind [`GenerativeModel`] so handlers can run
//! against Gemini in production and a canned model in tests.

use crate::config::GeminiConfig;
use crate::models::{Post, Stats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const COMMENT_MAX_CHARS: usize = 30;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("generative AI is not configured; set GEMINI_API_KEY")]
    NotConfigured,

    #[error("episode text is empty")]
    EmptyInput,

    #[error("network error: {0}")]
    Network(String),

    #[error("AI service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected AI response: {0}")]
    InvalidResponse(String),
}

pub type AiResult<T> = Result<T, AiError>;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logging.
    fn name(&self) -> &str;

    /// Sends a single prompt and returns the model's text answer.
    async fn generate(&self, prompt: &str) -> AiResult<String>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> AiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> AiResult<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if status != 200 {
            return Err(AiError::Http { status, body: text });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| AiError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let answer: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(AiError::InvalidResponse("no candidate text".to_string()));
        }
        Ok(answer)
    }
}

pub fn analysis_prompt(episode: &str) -> String {
    format!(
        r#"You analyse diary entries and estimate how the writer's condition changed.
Read the entry below and estimate a change between -100 and +100 for each of four parameters.

Diary entry:
{episode}

Parameters:
1. health: + for feeling well or exercising, - for fatigue or illness
2. happiness: + for joyful or rewarding events, - for sad or frustrating ones
3. mentalState: + for calm and relaxed, - for stress, pressure or anxiety
4. hunger: + for a satisfying meal, - for skipping meals or feeling hungry

Answer with JSON only, no other text:
{{"health": number, "happiness": number, "mentalState": number, "hunger": number}}

Rules:
- every value is an integer between -100 and +100
- use 0 for any parameter the entry does not mention
- keep estimates within common sense"#
    )
}

pub fn comment_prompt(post: &Post) -> String {
    let p = &post.parameters;
    format!(
        r#"Below is a diary entry the user wrote. Reply with one short, kind and empathetic comment of at most {COMMENT_MAX_CHARS} characters that encourages them.
Return only the sentence, without quotation marks.

Diary entry:
{}

Recorded changes: health {:+}, happiness {:+}, mentalState {:+}, hunger {:+}"#,
        post.episode, p.health, p.happiness, p.mental_state, p.hunger
    )
}

/// Asks the model for stat deltas implied by `episode`.
pub async fn analyze_episode(model: &dyn GenerativeModel, episode: &str) -> AiResult<Stats> {
    let episode = episode.trim();
    if episode.is_empty() {
        return Err(AiError::EmptyInput);
    }
    debug!(model = model.name(), "requesting stat analysis");
    let text = model.generate(&analysis_prompt(episode)).await?;
    let deltas = parse_deltas(&text)?;
    info!(model = model.name(), ?deltas, "stat analysis complete");
    Ok(deltas)
}

pub async fn generate_comment(model: &dyn GenerativeModel, post: &Post) -> AiResult<String> {
    debug!(model = model.name(), post = %post.id, "requesting comment");
    let text = model.generate(&comment_prompt(post)).await?;
    let comment = clean_comment(&text);
    if comment.is_empty() {
        return Err(AiError::InvalidResponse("empty comment".to_string()));
    }
    Ok(comment)
}

/// Extracts the JSON object from a model answer that may be wrapped in prose
/// or a code fence. Missing or non-numeric fields count as zero.
pub fn parse_deltas(text: &str) -> AiResult<Stats> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(AiError::InvalidResponse("no JSON object in answer".to_string())),
    };

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AiError::InvalidResponse(format!("malformed JSON: {e}")))?;

    let field = |key: &str| value.get(key).map(leading_integer).unwrap_or(0);
    Ok(Stats {
        health: field("health"),
        happiness: field("happiness"),
        mental_state: field("mentalState"),
        hunger: field("hunger"),
    }
    .clamped_delta())
}

fn leading_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<i64>().map(|n| sign * n).unwrap_or(0)
        }
        _ => 0,
    }
}

pub fn clean_comment(text: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '「', '」', '『', '』', '“', '”'];
    text.trim().trim_matches(QUOTES).trim().to_string()
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed answer and records every prompt it receives.
    pub struct CannedModel {
        pub answer: AiResult<String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl CannedModel {
        pub fn answering(text: &str) -> Self {
            Self {
                answer: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                answer: Err(AiError::Network(message.to_string())),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, prompt: &str) -> AiResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(AiError::Network(err.to_string())),
            }
        }
    }
}
