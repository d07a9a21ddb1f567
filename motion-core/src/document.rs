//! Animation documents - the untyped scene graphs being edited.
//!
//! A document is kept as a [`serde_json::Value`] rather than a typed Lottie
//! model: edits must preserve every field, including ones this crate never
//! looks at, and key order must survive a serialize/parse round trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreResult;

/// Top-level key whose presence marks a value as an animation document.
pub const VERSION_KEY: &str = "v";
/// Key of the layer sequence, both at the top level and inside assets.
pub const LAYERS_KEY: &str = "layers";
/// Layer type discriminator.
pub const TYPE_KEY: &str = "ty";
/// Type discriminator value of text layers.
pub const TEXT_LAYER_TYPE: u64 = 5;
/// Key of a color-valued property (fills, strokes).
pub const COLOR_KEY: &str = "c";
/// Key of a size-valued property (transform scale).
pub const SIZE_KEY: &str = "s";
/// Key holding a property's static value.
pub const VALUE_KEY: &str = "k";

/// An animation scene graph.
///
/// Wraps the raw JSON value. The pipeline only ever hands out clones, so a
/// document passed in by a caller is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationDocument(Value);

impl AnimationDocument {
    /// Wrap a JSON value. No validation is performed.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Mutably borrow the underlying value.
    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Unwrap into the underlying value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Whether the value carries the minimal animation signature: a mapping
    /// with the version-marker key.
    #[must_use]
    pub fn is_animation(&self) -> bool {
        self.0
            .as_object()
            .is_some_and(|map| map.contains_key(VERSION_KEY))
    }

    /// The top-level layer sequence, if present.
    #[must_use]
    pub fn layers(&self) -> Option<&Vec<Value>> {
        self.0.get(LAYERS_KEY).and_then(Value::as_array)
    }

    /// Number of top-level layers (zero when there is no layer sequence).
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers().map_or(0, Vec::len)
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Serialize to indented JSON, the form embedded in model instructions.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Parse a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }
}

impl From<Value> for AnimationDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<AnimationDocument> for Value {
    fn from(document: AnimationDocument) -> Self {
        document.0
    }
}

/// Concatenated text content of a text layer (`t.d.k[*].s.t`).
///
/// Returns an empty string when the layer has no text document.
#[must_use]
pub fn layer_text(layer: &serde_json::Map<String, Value>) -> String {
    let Some(keyframes) = layer
        .get("t")
        .and_then(|t| t.get("d"))
        .and_then(|d| d.get(VALUE_KEY))
        .and_then(Value::as_array)
    else {
        return String::new();
    };

    keyframes
        .iter()
        .filter_map(|keyframe| keyframe.get("s")?.get("t")?.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a mapping is a text layer (`ty == 5`).
#[must_use]
pub fn is_text_layer(node: &serde_json::Map<String, Value>) -> bool {
    node.get(TYPE_KEY).and_then(Value::as_u64) == Some(TEXT_LAYER_TYPE)
}
