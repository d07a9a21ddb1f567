//! Heuristic edit operations.
//!
//! The fallback engine knows a fixed catalog of structural edits. Each one is
//! a predicate plus a mutation evaluated at every mapping node during a single
//! [`walk`]; [`OperationVisitor`] dispatches on the operation variant so all
//! of them share one traversal. Token replacement is the exception: it works
//! on the serialized document and only uses the walker to protect size values.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::{is_text_layer, layer_text, COLOR_KEY, LAYERS_KEY, SIZE_KEY, VALUE_KEY};
use crate::walker::{walk, Visit, VisitContext, Visitor};
use crate::{AnimationDocument, CoreResult};

/// Decimal precision kept when scaling, to avoid float noise in the output.
const SCALE_PRECISION: f64 = 1e6;

/// A structural edit the fallback engine can perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HeuristicOperation {
    /// Remove text layers whose content contains any of `words`.
    DeleteByText {
        /// Lowercase substrings to look for.
        words: BTreeSet<String>,
    },
    /// Replace every static color value with `rgb`.
    Recolor {
        /// Red, green and blue channels in `[0, 1]`.
        rgb: [f64; 3],
    },
    /// Replace every textual occurrence of `old` with `new`.
    ReplaceToken {
        /// Token to find.
        old: String,
        /// Replacement token.
        new: String,
    },
    /// Grow every static size value by `factor`, never past `cap`.
    ScaleUp {
        /// Multiplier applied to the first two size entries.
        factor: f64,
        /// Upper bound for each scaled entry.
        cap: f64,
    },
}

impl HeuristicOperation {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DeleteByText { .. } => "delete_by_text",
            Self::Recolor { .. } => "recolor",
            Self::ReplaceToken { .. } => "replace_token",
            Self::ScaleUp { .. } => "scale_up",
        }
    }
}

/// What applying an operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicReport {
    /// Label of the applied operation.
    pub operation: &'static str,
    /// Nodes removed or rewritten (token occurrences for replacement).
    pub nodes_changed: usize,
}

impl HeuristicReport {
    /// Whether the operation left the document as it was.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.nodes_changed == 0
    }
}

/// Visitor applying one tree-shaped [`HeuristicOperation`].
#[derive(Debug)]
pub struct OperationVisitor<'a> {
    operation: &'a HeuristicOperation,
    changed: usize,
}

impl<'a> OperationVisitor<'a> {
    /// Create a visitor for `operation`.
    #[must_use]
    pub fn new(operation: &'a HeuristicOperation) -> Self {
        Self {
            operation,
            changed: 0,
        }
    }

    /// Number of mapping nodes rewritten so far.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.changed
    }
}

impl Visitor for OperationVisitor<'_> {
    fn enter(&mut self, node: &mut Map<String, Value>, _ctx: &VisitContext) -> Visit {
        match self.operation {
            HeuristicOperation::Recolor { rgb } => {
                if let Some(values) = static_values_mut(node, COLOR_KEY, 3) {
                    *values = rgb.iter().map(|channel| number(*channel)).collect();
                    self.changed += 1;
                }
            }
            HeuristicOperation::ScaleUp { factor, cap } => {
                if let Some(values) = static_values_mut(node, SIZE_KEY, 2) {
                    for entry in values.iter_mut().take(2) {
                        let current = entry.as_f64().unwrap_or_default();
                        let scaled = (current * factor * SCALE_PRECISION).round() / SCALE_PRECISION;
                        *entry = number(scaled.min(*cap));
                    }
                    self.changed += 1;
                }
            }
            HeuristicOperation::DeleteByText { .. } | HeuristicOperation::ReplaceToken { .. } => {}
        }
        Visit::Keep
    }

    fn leave(&mut self, node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit {
        let HeuristicOperation::DeleteByText { words } = self.operation else {
            return Visit::Keep;
        };
        if words.is_empty() || !ctx.is_member_of(LAYERS_KEY) || !is_text_layer(node) {
            return Visit::Keep;
        }

        let text = layer_text(node).to_lowercase();
        if words.iter().any(|word| text.contains(word.as_str())) {
            tracing::debug!(pointer = ctx.pointer(), text = %text, "removing text layer");
            Visit::Remove
        } else {
            Visit::Keep
        }
    }
}

/// Apply `operation` to `document` in place.
///
/// Finding nothing to change is not an error; the document is left as it was.
///
/// # Errors
///
/// Returns an error only if token replacement cannot serialize the document.
pub fn apply(
    document: &mut AnimationDocument,
    operation: &HeuristicOperation,
) -> CoreResult<HeuristicReport> {
    let nodes_changed = match operation {
        HeuristicOperation::ReplaceToken { old, new } => replace_tokens(document, old, new)?,
        _ => {
            let mut visitor = OperationVisitor::new(operation);
            let stats = walk(document.as_value_mut(), &mut visitor);
            visitor.changed() + stats.removed
        }
    };

    tracing::debug!(
        operation = operation.name(),
        nodes_changed,
        "heuristic applied"
    );
    Ok(HeuristicReport {
        operation: operation.name(),
        nodes_changed,
    })
}

/// Textual replacement over the serialized document.
///
/// Size values are restored afterwards so scale stays under [`HeuristicOperation::ScaleUp`]'s
/// control. If the rewritten text no longer parses, the document is kept.
fn replace_tokens(document: &mut AnimationDocument, old: &str, new: &str) -> CoreResult<usize> {
    if old.is_empty() {
        return Ok(0);
    }

    let text = document.to_json_string()?;
    let occurrences = text.matches(old).count();
    if occurrences == 0 {
        return Ok(0);
    }

    let replaced = text
        .replace(&format!("\"{old}\""), &format!("\"{new}\""))
        .replace(old, new);

    let mut rewritten: Value = match serde_json::from_str(&replaced) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%old, %new, error = %err, "replacement broke the document, keeping original");
            return Ok(0);
        }
    };

    let mut sizes = SizeSnapshot::default();
    let _ = walk(document.as_value_mut(), &mut sizes);
    let mut restored = 0;
    for (pointer, values) in sizes.0 {
        if let Some(slot) = rewritten.pointer_mut(&pointer) {
            if *slot != values {
                restored += serde_json::to_string(&values)?.matches(old).count();
                *slot = values;
            }
        }
    }

    if &rewritten == document.as_value() {
        return Ok(0);
    }
    *document = AnimationDocument::new(rewritten);
    Ok(occurrences.saturating_sub(restored))
}

/// Collects the static size values of a document, keyed by JSON pointer.
#[derive(Debug, Default)]
struct SizeSnapshot(Vec<(String, Value)>);

impl Visitor for SizeSnapshot {
    fn enter(&mut self, node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit {
        if let Some(values) = static_values_mut(node, SIZE_KEY, 2) {
            self.0.push((
                format!("{}/{SIZE_KEY}/{VALUE_KEY}", ctx.pointer()),
                Value::Array(values.clone()),
            ));
        }
        Visit::Keep
    }
}

/// The all-numeric static value sequence of property `key`, if it has at
/// least `min_len` entries.
fn static_values_mut<'a>(
    node: &'a mut Map<String, Value>,
    key: &str,
    min_len: usize,
) -> Option<&'a mut Vec<Value>> {
    let values = node
        .get_mut(key)?
        .as_object_mut()?
        .get_mut(VALUE_KEY)?
        .as_array_mut()?;
    (values.len() >= min_len && values.iter().all(Value::is_number)).then_some(values)
}

/// Whole floats are written back as integers so untouched-looking values
/// keep their original JSON form.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn number(value: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < MAX_EXACT {
        return if value >= 0.0 {
            Value::from(value as u64)
        } else {
            Value::from(value as i64)
        };
    }
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}
