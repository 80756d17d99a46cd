use crate::error::{NotesError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Retrieves raw document bytes given a storage reference.
///
/// No retry internally: the caller decides what a failed fetch means for
/// the event being processed.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Path-style object storage fetcher (`GET {endpoint}/{bucket}/{key}`)
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpFetcher {
    /// Create a new fetcher for one bucket
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(endpoint: String, bucket: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key);
        log::debug!("Fetching object: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NotesError::Fetch(format!("Network error fetching {}: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotesError::Fetch(format!(
                "Storage returned status {} for key {}",
                status, key
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NotesError::Fetch(format!("Failed to read body for {}: {}", key, e)))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_object_url_joins_path_segments() {
        let fetcher = HttpFetcher::new(
            "http://localhost:9000/".to_string(),
            "study-notes".to_string(),
        );
        assert_eq!(
            fetcher.object_url("uploads/doc1.pdf"),
            "http://localhost:9000/study-notes/uploads/doc1.pdf"
        );
    }

    #[tokio::test]
    async fn test_fetch_returns_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/study-notes/doc1.pdf");
                then.status(200).body(b"%PDF-1.4 raw bytes");
            })
            .await;

        let fetcher = HttpFetcher::new(server.base_url(), "study-notes".to_string());
        let bytes = fetcher.fetch("doc1.pdf").await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"%PDF-1.4 raw bytes");
    }

    #[tokio::test]
    async fn test_fetch_missing_key_is_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/study-notes/missing.pdf");
                then.status(404);
            })
            .await;

        let fetcher = HttpFetcher::new(server.base_url(), "study-notes".to_string());
        let err = fetcher.fetch("missing.pdf").await.unwrap_err();

        assert!(matches!(err, NotesError::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }
}
