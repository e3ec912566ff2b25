//! Extraction request validation.
//!
//! Runs before any upstream or store interaction.

use thiserror::Error;

use crate::types::ExtractionRequest;

/// Validation error types.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Body could not be decoded as an extraction request.
    #[error("Invalid request body")]
    InvalidBody(#[source] serde_json::Error),

    /// Body could not be read (too large or the stream failed).
    #[error("Invalid request body")]
    Unreadable(String),

    /// `content` is missing or empty.
    #[error("Content is required")]
    MissingContent,
}

/// Decode and validate an extraction request body.
///
/// # Errors
///
/// Returns `ValidationError::InvalidBody` for malformed JSON and
/// `ValidationError::MissingContent` when `content` is empty.
pub fn parse_extraction_request(body: &[u8]) -> Result<ExtractionRequest, ValidationError> {
    let request: ExtractionRequest =
        serde_json::from_slice(body).map_err(ValidationError::InvalidBody)?;
    validate_extraction_request(&request)?;
    Ok(request)
}

/// Validate a decoded extraction request.
///
/// # Errors
///
/// Returns `ValidationError::MissingContent` when `content` is empty.
pub fn validate_extraction_request(request: &ExtractionRequest) -> Result<(), ValidationError> {
    if request.content.is_empty() {
        return Err(ValidationError::MissingContent);
    }
    Ok(())
}
