//! Gemini `generateContent` client
//!
//! Direct REST integration, one request per prompt. No retry, no streaming,
//! no request timeout beyond the HTTP client's defaults.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TextGenerator;
use crate::config::GeneratorSettings;
use crate::error::{QueryGateError, Result};

/// Google Gemini text generation client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Create a client from settings.
    ///
    /// A missing API key is not an error here; each call then fails with `Generation`
    /// so the rest of the server keeps working.
    #[must_use]
    pub fn new(settings: &GeneratorSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key_set", &self.api_key.is_some())
            .finish()
    }
}

/// Request body for `generateContent`
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Raw API response structure
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| QueryGateError::generation("GEMINI_API_KEY is not set"))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryGateError::generation(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryGateError::generation(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(QueryGateError::generation(format!("{status}: {detail}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| QueryGateError::generation(format!("Invalid response body: {e}")))?;

        Ok(parsed.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_endpoint_and_model() {
        let settings = GeneratorSettings {
            api_key: Some("k".to_string()),
            model: "gemini-1.5-pro".to_string(),
            endpoint: "https://example.test/v1beta/".to_string(),
        };
        let client = GeminiClient::new(&settings);
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"```sql\nSELECT "},
                {"text":"1\n```"}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), "```sql\nSELECT 1\n```");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[tokio::test]
    async fn test_missing_key_is_generation_error() {
        let client = GeminiClient::new(&GeneratorSettings::default());
        let err = client.generate("SELECT 1").await.unwrap_err();
        assert_eq!(err.error_code(), "GENERATION_ERROR");
        assert!(err.details().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_debug_hides_key() {
        let settings = GeneratorSettings {
            api_key: Some("top-secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", GeminiClient::new(&settings)).contains("top-secret"));
    }
}
