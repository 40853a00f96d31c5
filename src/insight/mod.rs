//! AI-generated insights over dashboard metrics.
//!
//! `InsightGenerator` is the seam: the dashboard hands it a prompt and gets
//! back a stream of text deltas. `GeminiInsight` talks to the Gemini
//! `streamGenerateContent` endpoint in SSE mode; tests substitute their own
//! generator.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::InsightConfig;
use crate::database::models::{CourseEnrollmentCount, DailySignups};

/// Streamed to the caller in place of insight text when generation fails.
pub const FALLBACK_MESSAGE: &str = "Failed to generate insights. Please check your API key.";

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight generation is not configured (missing API key)")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed upstream payload: {0}")]
    Payload(String),
}

pub type InsightStream = BoxStream<'static, Result<String, InsightError>>;

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: String) -> Result<InsightStream, InsightError>;
}

/// Metrics summarised for the model.
#[derive(Debug, Clone, Serialize)]
pub struct InsightInput {
    pub enrollments_per_course: Vec<CourseEnrollmentCount>,
    pub student_growth_over_time: Vec<DailySignups>,
}

pub fn build_prompt(input: &InsightInput) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string_pretty(input)?;
    Ok(format!(
        "You are a senior business analyst for BrandHub, a learning platform that runs courses for \
         several brands. Analyze the following dashboard data and provide 3-4 concise, actionable \
         insights.\n\n\
         Data:\n{}\n\n\
         Focus on:\n\
         1. Enrollment trends and which courses are most popular\n\
         2. Student engagement and growth patterns\n\
         3. Course performance\n\
         4. Growth recommendations\n\n\
         Format as bullet points. Keep each insight under two sentences.",
        data
    ))
}

/// Turn a generator stream into display text: deltas pass through, and the
/// first error is replaced by `FALLBACK_MESSAGE`, which ends the stream.
pub fn with_fallback(deltas: InsightStream) -> impl Stream<Item = String> + Send {
    deltas.scan(false, |failed, item| {
        if *failed {
            return futures::future::ready(None);
        }
        let text = match item {
            Ok(text) => text,
            Err(e) => {
                error!("Insight generation failed: {}", e);
                *failed = true;
                FALLBACK_MESSAGE.to_string()
            }
        };
        futures::future::ready(Some(text))
    })
}

/// A stream that fails immediately, for generators that cannot start.
pub fn failed(err: InsightError) -> InsightStream {
    stream::once(futures::future::ready(Err(err))).boxed()
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini streaming client
#[derive(Debug, Clone)]
pub struct GeminiInsight {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiInsight {
    pub fn new(config: &InsightConfig) -> Result<Self, InsightError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.endpoint, self.model)
    }
}

#[async_trait]
impl InsightGenerator for GeminiInsight {
    async fn generate(&self, prompt: String) -> Result<InsightStream, InsightError> {
        let api_key = self.api_key.as_deref().ok_or(InsightError::NotConfigured)?;

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let url = self.url();
        debug!("Sending insight request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API error: {} - {}", status, body);
            return Err(InsightError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseTextDecoder::default();
        let deltas = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(&bytes),
                Err(e) => vec![Err(InsightError::Http(e))],
            })
            .flat_map(stream::iter)
            .boxed();
        Ok(deltas)
    }
}

/// Incremental parser for Gemini's SSE body. Bytes arrive in arbitrary chunks;
/// only complete lines are decoded, and each `data:` line yields the text of
/// the first candidate.
#[derive(Debug, Default)]
pub struct SseTextDecoder {
    buffer: Vec<u8>,
}

impl SseTextDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, InsightError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            match Self::text_of(data.trim_start()) {
                Ok(Some(text)) => out.push(Ok(text)),
                Ok(None) => {}
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    fn text_of(data: &str) -> Result<Option<String>, InsightError> {
        if data.is_empty() || data == "[DONE]" {
            return Ok(None);
        }
        let chunk: GeminiChunk = serde_json::from_str(data).map_err(|e| InsightError::Payload(e.to_string()))?;
        let text: String = chunk
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        Ok((!text.is_empty()).then_some(text))
    }
}
