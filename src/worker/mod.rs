use crate::bus::{EventConsumer, UploadEvent};
use crate::cache::{cache_key, ResultCache};
use crate::error::{NotesError, Result};
use crate::extract::{self, CONTENT_TYPE_PDF};
use crate::fetch::ContentFetcher;
use crate::store::NotesStore;
use crate::summarize::{ChunkingSummarizer, GenerationParams, SummaryOutcome};
use crate::types::NotesPayload;
use std::sync::Arc;
use std::time::Duration;

/// How processing one event ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// A live cache entry short-circuited the pipeline
    CacheHit,
    /// Notes were computed, cached, and persisted
    Completed { row_id: i64 },
    /// The model is warming up. The event is dropped with a log line: the
    /// bus path does not re-enqueue on cold start (known limitation).
    ColdStart { estimated_time: f64 },
}

/// Ingestion worker: sequences the pipeline per upload event.
///
/// Holds long-lived client handles only; no state is retained between
/// events. Duplicate redelivery is absorbed by the cache check, which is
/// the sole idempotency mechanism.
pub struct Worker {
    fetcher: Arc<dyn ContentFetcher>,
    summarizer: Arc<ChunkingSummarizer>,
    cache: Arc<dyn ResultCache>,
    store: Arc<dyn NotesStore>,
    cache_ttl_secs: u64,
}

impl Worker {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        summarizer: Arc<ChunkingSummarizer>,
        cache: Arc<dyn ResultCache>,
        store: Arc<dyn NotesStore>,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            cache,
            store,
            cache_ttl_secs,
        }
    }

    /// Run the full pipeline for one event: cache check, fetch, extract,
    /// summarize, flashcards, cache write, persist.
    pub async fn process_event(&self, event: &UploadEvent) -> Result<ProcessOutcome> {
        if event.file_key.trim().is_empty() {
            return Err(NotesError::InvalidInput("event has empty fileKey".to_string()));
        }

        log::info!("Processing file: {}", event.file_key);

        let fingerprint = cache_key(&event.file_key);
        if self.cache.get(&fingerprint).await?.is_some() {
            log::info!("Found cached results for {}", event.file_key);
            return Ok(ProcessOutcome::CacheHit);
        }

        let bytes = self.fetcher.fetch(&event.file_key).await?;
        log::info!("Fetched {} bytes for {}", bytes.len(), event.file_key);

        let content_type = event
            .metadata
            .get("contentType")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(CONTENT_TYPE_PDF);

        let text = extract::extract_text(&bytes, content_type)?;
        if text.trim().is_empty() {
            // Terminal: re-fetching will not make unreadable content readable
            return Err(NotesError::Extraction(format!(
                "Extracted text is empty for {}",
                event.file_key
            )));
        }
        log::info!("Extracted {} chars from {}", text.chars().count(), event.file_key);

        let summary = match self
            .summarizer
            .summarize(&text, &GenerationParams::default())
            .await
        {
            SummaryOutcome::ColdStart { estimated_time } => {
                log::warn!(
                    "Cold start while summarizing {} (~{}s); dropping event without re-enqueue",
                    event.file_key,
                    estimated_time
                );
                return Ok(ProcessOutcome::ColdStart { estimated_time });
            }
            SummaryOutcome::Summary(summary) => summary,
        };

        // Independent call; already degrades to empty on failure
        let flashcards = self.summarizer.generate_flashcards(&text).await;

        let payload = NotesPayload {
            summary,
            flashcards,
            quizzes: Vec::new(),
            full_text: text,
        };

        // Cache before persisting: a crash in between still prevents
        // duplicate summarization work on redelivery, at the cost of a
        // possibly missing durable row for this attempt.
        self.cache
            .set(&fingerprint, &payload, self.cache_ttl_secs)
            .await?;

        let row_id = self.store.insert(&event.file_key, &payload).await?;
        log::info!("Saved notes for {} (row {})", event.file_key, row_id);

        Ok(ProcessOutcome::Completed { row_id })
    }

    /// Consume events until the process is stopped. Each delivery is
    /// processed to completion, logged, and acknowledged regardless of
    /// outcome; errors never crash the loop.
    pub async fn run(&self, mut consumer: EventConsumer) -> Result<()> {
        loop {
            let deliveries = match consumer.read_batch().await {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    log::error!("Error reading from bus: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for delivery in deliveries {
                if let Some(event) = &delivery.event {
                    match self.process_event(event).await {
                        Ok(ProcessOutcome::CacheHit) => {}
                        Ok(ProcessOutcome::Completed { row_id }) => {
                            log::info!("Completed {} (row {})", event.file_key, row_id);
                        }
                        Ok(ProcessOutcome::ColdStart { estimated_time }) => {
                            log::warn!(
                                "Dropped {} due to cold start (~{}s)",
                                event.file_key,
                                estimated_time
                            );
                        }
                        Err(e) => {
                            log::error!("Processing error for {}: {}", event.file_key, e);
                        }
                    }
                }

                if let Err(e) = consumer.ack(&delivery.stream_id).await {
                    log::warn!("Failed to acknowledge {}: {}", delivery.stream_id, e);
                }
            }
        }
    }
}
