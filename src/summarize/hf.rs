use crate::config::InferenceConfig;
use crate::error::{NotesError, Result};
use crate::summarize::{ChunkOutput, GenerationParams, SummaryBackend};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Hugging Face Inference API client
///
/// Speaks the hosted inference wire format: one POST per request with
/// `{ "inputs": ..., "parameters"?: ... }`, success shapes of either an
/// array of `{ summary_text | generated_text }` objects or a single such
/// object, and a `{ "estimated_time": n }` body while the model is warming
/// up (sent with a non-success status, so it is checked before the status).
pub struct HfClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    summary_model: String,
    flashcard_model: String,
}

impl HfClient {
    /// Create a new inference client from configuration
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(config: &InferenceConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            summary_model: config.summary_model.clone(),
            flashcard_model: config.flashcard_model.clone(),
        }
    }

    /// Issue one inference request and classify the response
    async fn query(&self, model: &str, payload: &Value) -> Result<ChunkOutput> {
        let url = format!("{}/{}", self.base_url, model);
        log::debug!("Inference request: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await
            .map_err(|e| NotesError::Inference(format!("Network error: {}", e)))?;

        let status = response.status();

        // Read the raw body first: the service returns HTML for some errors
        let raw = response
            .text()
            .await
            .map_err(|e| NotesError::Inference(format!("Failed to read response body: {}", e)))?;

        if !raw.is_empty() {
            log::debug!(
                "Inference raw response (first 300 chars): {}",
                raw.chars().take(300).collect::<String>().replace('\n', " ")
            );
        }

        let data: Value = serde_json::from_str(&raw).map_err(|_| {
            NotesError::Inference(format!(
                "Invalid JSON response from inference API (status {})",
                status
            ))
        })?;

        // Cold start is reported with a 503, so check the shape before the status
        if let Some(estimated_time) = data.get("estimated_time").and_then(Value::as_f64) {
            return Ok(ChunkOutput::ColdStart { estimated_time });
        }

        if !status.is_success() {
            let message = data
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Inference API error (status {})", status));
            return Err(NotesError::Inference(message));
        }

        match extract_generated_text(&data) {
            Some(text) => Ok(ChunkOutput::Text(text)),
            None => Err(NotesError::Inference(format!(
                "Unexpected response shape: {}",
                truncate(&data.to_string(), 400)
            ))),
        }
    }
}

#[async_trait]
impl SummaryBackend for HfClient {
    async fn summarize_chunk(
        &self,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ChunkOutput> {
        let mut payload = json!({ "inputs": text });
        if !params.is_empty() {
            payload["parameters"] = serde_json::to_value(params)
                .map_err(|e| NotesError::Inference(format!("Bad parameters: {}", e)))?;
        }

        self.query(&self.summary_model, &payload).await
    }

    async fn generate_flashcards(&self, text: &str) -> Result<ChunkOutput> {
        let prompt = format!(
            "Create study flashcards from the following text. \
             Write each card as two lines, 'Q:' then 'A:'.\n\n{}",
            text
        );

        self.query(&self.flashcard_model, &json!({ "inputs": prompt }))
            .await
    }
}

/// Pull the generated text out of the service's array-or-object shapes
fn extract_generated_text(data: &Value) -> Option<String> {
    let item = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };

    item.get("summary_text")
        .or_else(|| item.get("generated_text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_client(base_url: &str) -> HfClient {
        let config = InferenceConfig {
            base_url: base_url.to_string(),
            summary_model: "facebook/bart-large-cnn".to_string(),
            flashcard_model: "google/flan-t5-base".to_string(),
            api_key_env: "HUGGINGFACE_API_KEY".to_string(),
            chunk_size: 1500,
            request_timeout_secs: 10,
        };
        HfClient::new(&config, "test-key".to_string())
    }

    #[test]
    fn test_extract_generated_text_array_shape() {
        let data = serde_json::json!([{"summary_text": "Point A\nPoint B"}]);
        assert_eq!(
            extract_generated_text(&data),
            Some("Point A\nPoint B".to_string())
        );
    }

    #[test]
    fn test_extract_generated_text_object_shape() {
        let data = serde_json::json!({"generated_text": "Q: x\nA: y"});
        assert_eq!(extract_generated_text(&data), Some("Q: x\nA: y".to_string()));
    }

    #[test]
    fn test_extract_generated_text_unexpected_shape() {
        assert_eq!(extract_generated_text(&serde_json::json!({"foo": 1})), None);
        assert_eq!(extract_generated_text(&serde_json::json!([])), None);
    }

    #[tokio::test]
    async fn test_summarize_chunk_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/facebook/bart-large-cnn")
                    .header("authorization", "Bearer test-key")
                    .json_body(serde_json::json!({"inputs": "some text"}));
                then.status(200)
                    .json_body(serde_json::json!([{"summary_text": "Point A"}]));
            })
            .await;

        let client = test_client(&server.base_url());
        let out = client
            .summarize_chunk("some text", &GenerationParams::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(out, ChunkOutput::Text("Point A".to_string()));
    }

    #[tokio::test]
    async fn test_parameters_forwarded_when_set() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/bart-large-cnn").json_body(
                    serde_json::json!({
                        "inputs": "text",
                        "parameters": {"max_length": 320, "min_length": 80}
                    }),
                );
                then.status(200)
                    .json_body(serde_json::json!([{"summary_text": "ok"}]));
            })
            .await;

        let client = test_client(&server.base_url());
        let params = GenerationParams {
            max_length: Some(320),
            min_length: Some(80),
            do_sample: None,
        };
        client.summarize_chunk("text", &params).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cold_start_detected_despite_503() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/bart-large-cnn");
                then.status(503)
                    .json_body(serde_json::json!({"estimated_time": 20.5}));
            })
            .await;

        let client = test_client(&server.base_url());
        let out = client
            .summarize_chunk("text", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(
            out,
            ChunkOutput::ColdStart {
                estimated_time: 20.5
            }
        );
    }

    #[tokio::test]
    async fn test_error_status_uses_service_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/bart-large-cnn");
                then.status(400)
                    .json_body(serde_json::json!({"error": "inputs too long"}));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .summarize_chunk("text", &GenerationParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, NotesError::Inference(_)));
        assert!(err.to_string().contains("inputs too long"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_inference_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/bart-large-cnn");
                then.status(200).body("<html>gateway error</html>");
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .summarize_chunk("text", &GenerationParams::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_flashcards_hit_flashcard_model() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/google/flan-t5-base");
                then.status(200).json_body(
                    serde_json::json!([{"generated_text": "Q: Topic?\nA: Summaries."}]),
                );
            })
            .await;

        let client = test_client(&server.base_url());
        let out = client.generate_flashcards("study text").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            out,
            ChunkOutput::Text("Q: Topic?\nA: Summaries.".to_string())
        );
    }
}
