use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::error::EmbedError;

/// Providers cap input length themselves; longer text is silently truncated
/// rather than rejected, matching how the upstream API treats long inputs.
const MAX_INPUT_CHARS: usize = 8000;

/// Maps text to a fixed-dimension embedding vector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Vector dimension this provider produces, fixed per deployment
    fn dimension(&self) -> usize;
}

/// Embedding client for OpenAI-compatible `/embeddings` endpoints
pub struct OpenAiEmbeddings {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
    dimension: usize,
}

/// Response body of the embeddings endpoint
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: String, api_url: String, model: String, dimension: usize) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
            dimension,
        }
    }
}

fn truncate_input(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let input = truncate_input(text);
        if input.trim().is_empty() {
            return Err(EmbedError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "input": input,
            "model": self.model,
            "encoding_format": "float",
        });

        tracing::debug!(model = %self.model, chars = input.len(), "requesting embedding");

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited);
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::InvalidInput(format!(
                "provider rejected input ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(EmbedError::Unavailable(format!(
                "provider returned status {}",
                status
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Unavailable(format!("malformed response: {}", e)))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::Unavailable("response contained no embedding".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbedError::Unavailable(format!(
                "expected dimension {}, provider returned {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_input_short_text_untouched() {
        assert_eq!(truncate_input("running shoe"), "running shoe");
    }

    #[test]
    fn test_truncate_input_caps_long_text() {
        let long = "x".repeat(MAX_INPUT_CHARS + 100);
        assert_eq!(truncate_input(&long).len(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_truncate_input_respects_char_boundaries() {
        let long = "ß".repeat(MAX_INPUT_CHARS + 1);
        let truncated = truncate_input(&long);
        assert_eq!(truncated.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"data":[{"embedding":[0.1,0.2,0.3]}],"model":"m","usage":{"total_tokens":3}}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }
}
