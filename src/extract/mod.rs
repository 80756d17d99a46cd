use crate::error::{NotesError, Result};

/// Default declared content type for uploaded documents
pub const CONTENT_TYPE_PDF: &str = "application/pdf";

/// Convert raw document bytes into plain text.
///
/// PDF bytes are parsed and their textual content extracted; anything else
/// is treated as UTF-8 text verbatim. A PDF with no extractable text yields
/// an empty string, not an error: the caller is responsible for classifying
/// empty output as a terminal failure.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String> {
    if content_type == CONTENT_TYPE_PDF {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| NotesError::Extraction(format!("Failed to parse PDF: {}", e)))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
