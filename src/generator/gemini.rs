use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ContentGenerator, GenerationError};

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    /// 取第一个候选的全部文本片段并去掉首尾空白
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

fn build_prompt(topic: &str, min_length: usize, max_length: usize) -> String {
    format!(
        "Write a short message of {min}-{max} characters about: \"{topic}\".\n\
         Speak as an experienced software engineer sharing a personal take. \
         Keep it informative, conversational and to the point. \
         Plain text only: no quotes, markdown or lists.",
        min = min_length,
        max = max_length,
        topic = topic,
    )
}

/// Gemini generateContent 客户端
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(
        &self,
        topic: &str,
        min_length: usize,
        max_length: usize,
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(topic, min_length, max_length);
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest {
                contents: vec![Content {
                    parts: vec![RequestPart { text: &prompt }],
                }],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned {}: {}", status, body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.text();
        if text.is_empty() {
            tracing::error!("Empty response from Gemini for topic '{}'", topic);
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}
