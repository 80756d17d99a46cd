use thiserror::Error;

/// Main error type for the studynotes pipeline
///
/// Cold start from the inference service is deliberately NOT represented
/// here: it is a deferred-retry signal, not a failure, and travels as a
/// value (`SummaryOutcome::ColdStart`).
#[derive(Error, Debug)]
pub enum NotesError {
    /// Source document could not be retrieved (missing key, transfer failure)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// No text could be recovered from the document (terminal, never retried)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Inference API errors (bad response, non-JSON body, non-success status)
    #[error("Inference error: {0}")]
    Inference(String),

    /// Durable store errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Result cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Message bus errors
    #[error("Bus error: {0}")]
    Bus(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using NotesError
pub type Result<T> = std::result::Result<T, NotesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotesError::Fetch("bucket/key not found".to_string());
        assert!(err.to_string().contains("Fetch error"));
        assert!(err.to_string().contains("bucket/key not found"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let sqlite_err = rusqlite::Error::InvalidQuery;
        let err: NotesError = sqlite_err.into();
        assert!(matches!(err, NotesError::Persistence(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NotesError = io_err.into();
        assert!(matches!(err, NotesError::Io(_)));
    }
}
