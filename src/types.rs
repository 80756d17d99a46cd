use serde::{Deserialize, Serialize};

/// A question/answer pair derived from the document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// The computed notes for one document: the unit that is cached and persisted.
///
/// Serialized field names are the wire contract shared by the result cache
/// value and the durable store row (`quizzes` is reserved and currently
/// always empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesPayload {
    pub summary: String,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub quizzes: Vec<serde_json::Value>,
    pub full_text: String,
}
