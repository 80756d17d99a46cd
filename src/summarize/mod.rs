use crate::error::Result;
use crate::types::Flashcard;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub mod hf;

pub use hf::HfClient;

/// Returned when no chunk produced any usable text
pub const NO_SUMMARY_SENTINEL: &str = "No summary generated.";

/// Bullet marker prepended to each surviving summary line
const BULLET: &str = "• ";

/// Optional generation parameters forwarded to the inference service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
}

impl GenerationParams {
    pub fn is_empty(&self) -> bool {
        self.max_length.is_none() && self.min_length.is_none() && self.do_sample.is_none()
    }
}

/// What the inference service said about one request
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutput {
    /// Generated text for this chunk
    Text(String),
    /// The model is warming up; retry the whole request after this many seconds
    ColdStart { estimated_time: f64 },
}

/// Final result of a multi-chunk summarization
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// Merged bullet-point summary (or the no-summary sentinel)
    Summary(String),
    /// A chunk hit a cold start; all per-chunk output is discarded and the
    /// caller is expected to retry the whole request later
    ColdStart { estimated_time: f64 },
}

/// One inference request per chunk, plus the independent flashcard call.
/// Implemented by the production HTTP client and by scripted fakes in tests.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize_chunk(&self, text: &str, params: &GenerationParams)
        -> Result<ChunkOutput>;

    async fn generate_flashcards(&self, text: &str) -> Result<ChunkOutput>;
}

/// Split text into contiguous, non-overlapping segments of at most
/// `max_chars` characters, in original order; the last segment may be
/// shorter. Segmentation is purely length-based, with no sentence-boundary
/// awareness.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// Reformat generated text so each non-empty line carries a bullet marker
fn bulletify(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("{}{}", BULLET, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse `Q: ... / A: ...` line pairs out of generated text
fn parse_flashcards(text: &str) -> Vec<Flashcard> {
    let mut cards = Vec::new();
    let mut pending_question: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if let Some(q) = line.strip_prefix("Q:") {
            pending_question = Some(q.trim().to_string());
        } else if let Some(a) = line.strip_prefix("A:") {
            if let Some(question) = pending_question.take() {
                let answer = a.trim().to_string();
                if !question.is_empty() && !answer.is_empty() {
                    cards.push(Flashcard { question, answer });
                }
            }
        }
    }

    cards
}

/// Produces one merged bullet-point summary for arbitrarily long input,
/// bounded by the service's per-request size limit.
///
/// Policy asymmetry, by contract: a cold-start response aborts the entire
/// multi-chunk operation immediately (already-summarized chunks are
/// discarded), while a per-chunk error only degrades that chunk's
/// contribution to an inline error note.
pub struct ChunkingSummarizer {
    backend: Arc<dyn SummaryBackend>,
    chunk_size: usize,
}

impl ChunkingSummarizer {
    pub fn new(backend: Arc<dyn SummaryBackend>, chunk_size: usize) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Summarize `text`, one inference request per chunk
    pub async fn summarize(&self, text: &str, params: &GenerationParams) -> SummaryOutcome {
        let chunks = chunk_text(text, self.chunk_size);
        log::debug!("Summarizing {} chunk(s)", chunks.len());

        let mut blocks: Vec<String> = Vec::new();

        for (i, chunk) in chunks.iter().enumerate() {
            match self.backend.summarize_chunk(chunk, params).await {
                Ok(ChunkOutput::ColdStart { estimated_time }) => {
                    log::info!(
                        "Model cold start reported on chunk {}: ~{}s; aborting remaining chunks",
                        i,
                        estimated_time
                    );
                    return SummaryOutcome::ColdStart { estimated_time };
                }
                Ok(ChunkOutput::Text(generated)) => {
                    let block = bulletify(&generated);
                    if block.is_empty() {
                        log::warn!("Chunk {} produced no usable summary text", i);
                    } else {
                        blocks.push(block);
                    }
                }
                Err(e) => {
                    log::error!("Summary error on chunk {}: {}", i, e);
                    blocks.push(format!("{}Error: {}", BULLET, e));
                }
            }
        }

        if blocks.is_empty() {
            SummaryOutcome::Summary(NO_SUMMARY_SENTINEL.to_string())
        } else {
            SummaryOutcome::Summary(blocks.join("\n"))
        }
    }

    /// Generate flashcards from the document text.
    ///
    /// This is an independent second call against the same text; any failure
    /// (including a cold start) degrades to an empty list so it never blocks
    /// the summary being saved. Only the first chunk-sized excerpt is sent,
    /// keeping the request within the service's size limit.
    pub async fn generate_flashcards(&self, text: &str) -> Vec<Flashcard> {
        let excerpt: String = text.chars().take(self.chunk_size).collect();

        match self.backend.generate_flashcards(&excerpt).await {
            Ok(ChunkOutput::Text(generated)) => parse_flashcards(&generated),
            Ok(ChunkOutput::ColdStart { estimated_time }) => {
                log::warn!(
                    "Flashcard model cold start (~{}s); continuing without flashcards",
                    estimated_time
                );
                Vec::new()
            }
            Err(e) => {
                log::warn!("Flashcard generation failed: {}; continuing without", e);
                Vec::new()
            }
        }
    }
}
