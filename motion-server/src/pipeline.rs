//! Edit orchestration.
//!
//! An edit first goes to the external model. A reply that validates as an
//! animation is returned as is; anything else (timeout, transport error,
//! unparseable or wrongly shaped reply) drops to the heuristic fallback,
//! which classifies the prompt and applies at most one structural operation
//! to a copy of the original document.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use motion_core::{
    apply, classify, validate, AnimationDocument, CoreResult, FailureKind, HeuristicConfig,
    HeuristicOperation, HeuristicReport,
};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::metrics;
use crate::model::{EditModel, ModelClient};

/// Message for an edit produced by the model.
pub const MESSAGE_MODEL: &str = "edited by model";
/// Message for an edit produced by the heuristic fallback.
pub const MESSAGE_FALLBACK: &str = "edited by fallback";
/// Message when neither path changed anything.
pub const MESSAGE_NO_RULE: &str = "no applicable rule";

/// Function applying a heuristic operation to a document in place.
pub type Applier = fn(&mut AnimationDocument, &HeuristicOperation) -> CoreResult<HeuristicReport>;

/// Body of `POST /api/animations/edit`.
#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    /// Document to edit.
    #[serde(rename = "animationData")]
    pub document: AnimationDocument,
    /// Natural-language instruction.
    pub prompt: String,
    /// Caller's identifier for the animation, only used for logging.
    #[serde(rename = "animationId", default)]
    pub subject_id: Option<String>,
}

/// How an edit was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The model's reply was accepted.
    Model,
    /// The model path failed and a heuristic rule was applied.
    Fallback(FailureKind),
    /// The model path failed and no heuristic rule matched the prompt, or
    /// the matched rule found nothing to change.
    NoRule,
    /// The matched heuristic rule could not be applied.
    HeuristicFailed,
}

impl EditOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Fallback(_) => "fallback",
            Self::NoRule => "no_rule",
            Self::HeuristicFailed => "heuristic_failed",
        }
    }
}

/// Result of one edit.
///
/// A failed edit still carries the original document so the caller always
/// has something to render.
#[derive(Debug, Clone, Serialize)]
pub struct EditResult {
    /// Whether the edit completed.
    #[serde(rename = "success")]
    pub succeeded: bool,
    /// The edited (or original) document.
    #[serde(rename = "animationData")]
    pub document: AnimationDocument,
    /// Human-readable status.
    pub message: String,
    /// Which path produced the document.
    #[serde(skip)]
    pub outcome: EditOutcome,
}

impl EditResult {
    fn new(
        succeeded: bool,
        document: AnimationDocument,
        message: impl Into<String>,
        outcome: EditOutcome,
    ) -> Self {
        Self {
            succeeded,
            document,
            message: message.into(),
            outcome,
        }
    }
}

/// The edit pipeline.
///
/// Cheap to clone and shared across request handlers.
#[derive(Debug, Clone)]
pub struct EditPipeline {
    client: ModelClient,
    heuristics: Arc<HeuristicConfig>,
    applier: Applier,
}

impl EditPipeline {
    /// Build a pipeline from a model client and fallback rules.
    #[must_use]
    pub fn new(client: ModelClient, heuristics: HeuristicConfig) -> Self {
        Self {
            client,
            heuristics: Arc::new(heuristics),
            applier: apply,
        }
    }

    /// Replace the function that applies heuristic operations.
    #[must_use]
    pub fn with_applier(mut self, applier: Applier) -> Self {
        self.applier = applier;
        self
    }

    /// Build a pipeline around a specific model, with the configured timeout.
    #[must_use]
    pub fn with_model(model: Arc<dyn EditModel>, config: &PipelineConfig) -> Self {
        Self::new(
            ModelClient::new(model, config.editor.timeout),
            config.heuristics.clone(),
        )
    }

    /// Build a pipeline from configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            ModelClient::from_config(&config.editor),
            config.heuristics.clone(),
        )
    }

    /// Whether a real model is configured.
    #[must_use]
    pub fn model_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Apply `prompt` to `document`.
    ///
    /// Never fails: every failure is folded into the returned [`EditResult`].
    /// `document` itself is never modified.
    #[tracing::instrument(
        name = "edit",
        skip_all,
        fields(subject_id = subject_id.unwrap_or(""), prompt_len = prompt.len())
    )]
    pub async fn edit(
        &self,
        document: &AnimationDocument,
        prompt: &str,
        subject_id: Option<&str>,
    ) -> EditResult {
        let started = Instant::now();

        let result = match self.try_model(document, prompt).await {
            Ok(edited) => {
                tracing::info!("model edit accepted");
                EditResult::new(true, edited, MESSAGE_MODEL, EditOutcome::Model)
            }
            Err(kind) => {
                metrics::record_model_failure(kind.as_str());
                tracing::warn!(reason = kind.as_str(), "falling back to heuristics");
                self.fall_back(document, prompt, kind)
            }
        };

        metrics::record_edit(result.outcome.as_str(), started.elapsed().as_secs_f64());
        result
    }

    async fn try_model(
        &self,
        document: &AnimationDocument,
        prompt: &str,
    ) -> Result<AnimationDocument, FailureKind> {
        let raw = self.client.request(document, prompt).await?;
        validate(&raw)
    }

    fn fall_back(
        &self,
        document: &AnimationDocument,
        prompt: &str,
        cause: FailureKind,
    ) -> EditResult {
        let Some(operation) = classify(prompt, &self.heuristics) else {
            tracing::info!("no heuristic rule matched");
            return EditResult::new(true, document.clone(), MESSAGE_NO_RULE, EditOutcome::NoRule);
        };

        let mut edited = document.clone();
        let applier = self.applier;
        let applied = catch_unwind(AssertUnwindSafe(|| applier(&mut edited, &operation)));

        match applied {
            Ok(Ok(report)) if report.is_noop() => {
                tracing::info!(operation = report.operation, "heuristic rule changed nothing");
                EditResult::new(true, document.clone(), MESSAGE_NO_RULE, EditOutcome::NoRule)
            }
            Ok(Ok(report)) => {
                tracing::info!(
                    operation = report.operation,
                    nodes_changed = report.nodes_changed,
                    "heuristic edit applied"
                );
                EditResult::new(true, edited, MESSAGE_FALLBACK, EditOutcome::Fallback(cause))
            }
            Ok(Err(err)) => {
                tracing::error!(operation = operation.name(), error = %err, "heuristic edit failed");
                EditResult::new(
                    false,
                    document.clone(),
                    format!("heuristic edit failed: {err}"),
                    EditOutcome::HeuristicFailed,
                )
            }
            Err(_) => {
                tracing::error!(operation = operation.name(), "heuristic edit panicked");
                EditResult::new(
                    false,
                    document.clone(),
                    format!("heuristic edit {} aborted", operation.name()),
                    EditOutcome::HeuristicFailed,
                )
            }
        }
    }
}
