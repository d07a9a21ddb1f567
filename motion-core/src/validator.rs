//! Validation of model responses.
//!
//! Models frequently wrap JSON in a fenced code block or pad it with
//! whitespace. [`validate`] strips one fence, parses the remainder and checks
//! it still looks like an animation before the pipeline accepts it.

use crate::{AnimationDocument, FailureKind};

const FENCE: &str = "```";

/// Parse raw model output into an animation document.
///
/// # Errors
///
/// Returns [`FailureKind::Malformed`] if the text is not JSON, and
/// [`FailureKind::InvalidShape`] if it is JSON but not a mapping carrying
/// the version-marker key.
pub fn validate(raw: &str) -> Result<AnimationDocument, FailureKind> {
    let body = strip_fence(raw);

    let document = AnimationDocument::from_json_str(body).map_err(|err| {
        tracing::debug!(error = %err, "model response did not parse");
        FailureKind::Malformed
    })?;

    if document.is_animation() {
        Ok(document)
    } else {
        Err(FailureKind::InvalidShape)
    }
}

/// Remove a single leading fence (with optional language tag) and a single
/// trailing fence.
fn strip_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        // Drop the language tag on the opening line, e.g. ```json
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_is_accepted() {
        let doc = validate(r#"{"v":"5.5.7","layers":[]}"#).expect("valid");
        assert_eq!(doc.as_value(), &json!({"v": "5.5.7", "layers": []}));
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "```json\n{\"v\": \"5.5.7\", \"nm\": \"x\"}\n```\n";
        let doc = validate(raw).expect("valid");
        assert_eq!(doc.as_value()["nm"], json!("x"));
    }

    #[test]
    fn test_bare_fence_is_accepted() {
        let raw = "  ```\n{\"v\": \"5\"}\n```";
        assert!(validate(raw).is_ok());
    }

    #[test]
    fn test_unfenced_prose_is_malformed() {
        assert_eq!(
            validate("Sure! Here is your animation.").unwrap_err(),
            FailureKind::Malformed
        );
        assert_eq!(validate("").unwrap_err(), FailureKind::Malformed);
        assert_eq!(validate("```json\n{\"v\": ").unwrap_err(), FailureKind::Malformed);
    }

    #[test]
    fn test_json_without_version_is_invalid_shape() {
        assert_eq!(validate(r#"{"foo":1}"#).unwrap_err(), FailureKind::InvalidShape);
        assert_eq!(validate("[1, 2, 3]").unwrap_err(), FailureKind::InvalidShape);
        assert_eq!(validate("\"v\"").unwrap_err(), FailureKind::InvalidShape);
    }

    #[test]
    fn test_strip_fence_only_strips_one() {
        assert_eq!(strip_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_fence("{}"), "{}");
        assert_eq!(strip_fence("``````"), "");
    }
}
