//! Input validation for untrusted data.
//!
//! Edit requests are checked here before they reach the pipeline.

use serde_json::Value;
use thiserror::Error;

/// Maximum prompt length, in characters.
pub const MAX_PROMPT_LEN: usize = 2000;
/// Maximum length for animation IDs.
pub const MAX_ANIMATION_ID_LEN: usize = 64;

/// Validation error types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Prompt is empty or whitespace.
    #[error("prompt must not be empty")]
    PromptEmpty,
    /// Prompt exceeds maximum length.
    #[error("prompt too long (max {MAX_PROMPT_LEN} chars)")]
    PromptTooLong,
    /// Animation ID exceeds maximum length.
    #[error("animationId too long (max {MAX_ANIMATION_ID_LEN} chars)")]
    AnimationIdTooLong,
    /// Animation ID contains invalid characters.
    #[error("animationId contains invalid characters")]
    AnimationIdInvalidChars,
    /// Animation data is not a JSON object.
    #[error("animationData must be a JSON object")]
    AnimationDataNotObject,
}

impl ValidationError {
    /// Field label used in metrics.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::PromptEmpty | Self::PromptTooLong => "prompt",
            Self::AnimationIdTooLong | Self::AnimationIdInvalidChars => "animation_id",
            Self::AnimationDataNotObject => "animation_data",
        }
    }
}

/// Check if a character is valid for IDs (ASCII alphanumeric, hyphen, or underscore).
fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validate an edit prompt.
///
/// # Errors
///
/// Returns [`ValidationError::PromptEmpty`] if the prompt is blank.
/// Returns [`ValidationError::PromptTooLong`] if it exceeds 2000 characters.
pub fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::PromptEmpty);
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(ValidationError::PromptTooLong);
    }
    Ok(())
}

/// Validate an animation ID.
///
/// Valid animation IDs:
/// - 0-64 characters (empty means "not given")
/// - ASCII alphanumeric, hyphen, underscore only
///
/// # Errors
///
/// Returns [`ValidationError::AnimationIdTooLong`] if the ID exceeds 64 characters.
/// Returns [`ValidationError::AnimationIdInvalidChars`] if the ID contains invalid characters.
pub fn validate_animation_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_ANIMATION_ID_LEN {
        return Err(ValidationError::AnimationIdTooLong);
    }
    if !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::AnimationIdInvalidChars);
    }
    Ok(())
}

/// Validate that animation data is a JSON object.
///
/// Whether it is actually an animation is left to the pipeline.
///
/// # Errors
///
/// Returns [`ValidationError::AnimationDataNotObject`] for any other JSON value.
pub fn validate_animation_data(data: &Value) -> Result<(), ValidationError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(ValidationError::AnimationDataNotObject)
    }
}
