use crate::error::ApiError;

/// Maximum text length for synthesis requests
const MAX_TEXT_LENGTH: usize = 5000;

/// Validate a synthesis request
pub fn validate_synthesis_request(text: &str, language: Option<&str>) -> Result<(), ApiError> {
    if text.is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    if let Some(lang) = language {
        if !is_valid_language_code(lang) {
            return Err(ApiError::InvalidInput(format!(
                "Invalid language code format: {}. Expected format: ll or ll_CC (e.g., en, de_DE)",
                lang
            )));
        }
    }

    Ok(())
}

/// Validate the requested streaming granularity
pub fn validate_stream_chunk_size(chunk_size: u32) -> Result<(), ApiError> {
    if chunk_size == 0 {
        return Err(ApiError::InvalidInput(
            "stream_chunk_size must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Validate language code format (e.g., en, en_US, de_DE)
fn is_valid_language_code(code: &str) -> bool {
    let parts: Vec<&str> = code.split('_').collect();
    match parts.len() {
        1 => parts[0].len() == 2 && parts[0].chars().all(|c| c.is_ascii_lowercase()),
        2 => {
            parts[0].len() == 2
                && parts[0].chars().all(|c| c.is_ascii_lowercase())
                && parts[1].len() == 2
                && parts[1].chars().all(|c| c.is_ascii_uppercase())
        }
        _ => false,
    }
}
