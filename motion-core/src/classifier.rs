//! Prompt classification for the heuristic fallback.
//!
//! Maps a free-text instruction to at most one [`HeuristicOperation`] by
//! ordered keyword matching. A prompt can trigger several rules ("change the
//! color to red and make it bigger"); the first rule in this order wins:
//!
//! 1. `delete` / `remove` → [`HeuristicOperation::DeleteByText`]
//! 2. a color word → [`HeuristicOperation::Recolor`]
//! 3. `replace` / `change` with two 4-digit numbers → [`HeuristicOperation::ReplaceToken`]
//! 4. `bigger` / `larger` → [`HeuristicOperation::ScaleUp`]
//!
//! Delete targets come only from [`HeuristicConfig::delete_vocabulary`]; a
//! delete prompt naming nothing from it yields an empty word set, which
//! removes nothing.
//!
//! Rule 3 is not a selected no-op when the prompt lacks two numerals: it does
//! not fire at all and evaluation continues with rule 4, so "change the size,
//! make it bigger" scales.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::HeuristicOperation;

/// Default growth factor for "bigger" prompts.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.2;
/// Default upper bound for scaled size entries.
pub const DEFAULT_SCALE_CAP: f64 = 200.0;

const DELETE_TRIGGERS: [&str; 2] = ["delete", "remove"];
const REPLACE_TRIGGERS: [&str; 2] = ["replace", "change"];
const SCALE_TRIGGERS: [&str; 2] = ["bigger", "larger"];

/// Named colors and their RGB channels.
const COLORS: [(&str, [f64; 3]); 3] = [
    ("green", [0.0, 1.0, 0.0]),
    ("blue", [0.0, 0.0, 1.0]),
    ("red", [1.0, 0.0, 0.0]),
];
const AMBIGUOUS_COLOR: [f64; 3] = [0.0, 1.0, 0.0];

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("static word pattern"));
static FOUR_DIGIT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{4}\b").expect("static numeral pattern"));

/// Tunables for the fallback rules.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    /// Phrases looked up in "delete" prompts, lowercase.
    pub delete_vocabulary: Vec<String>,
    /// Growth factor for "bigger" prompts.
    pub scale_factor: f64,
    /// Upper bound for scaled size entries.
    pub scale_cap: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            delete_vocabulary: ["bet", "longs", "2019", "2020", "clover", "hello"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            scale_cap: DEFAULT_SCALE_CAP,
        }
    }
}

/// Pick the heuristic operation for `prompt`, if any rule applies.
#[must_use]
pub fn classify(prompt: &str, config: &HeuristicConfig) -> Option<HeuristicOperation> {
    let lower = prompt.to_lowercase();

    if has_trigger(&lower, &DELETE_TRIGGERS) {
        let words = delete_targets(&lower, &config.delete_vocabulary);
        return Some(HeuristicOperation::DeleteByText { words });
    }

    if let Some(rgb) = color_of(&lower) {
        return Some(HeuristicOperation::Recolor { rgb });
    }

    if has_trigger(&lower, &REPLACE_TRIGGERS) {
        if let Some((old, new)) = replacement_pair(prompt) {
            return Some(HeuristicOperation::ReplaceToken { old, new });
        }
    }

    if has_trigger(&lower, &SCALE_TRIGGERS) {
        return Some(HeuristicOperation::ScaleUp {
            factor: config.scale_factor,
            cap: config.scale_cap,
        });
    }

    None
}

fn has_trigger(lower: &str, triggers: &[&str]) -> bool {
    triggers.iter().any(|t| lower.contains(t))
}

/// Vocabulary phrases mentioned in the prompt.
fn delete_targets(lower: &str, vocabulary: &[String]) -> BTreeSet<String> {
    vocabulary
        .iter()
        .filter(|phrase| !phrase.is_empty() && lower.contains(phrase.as_str()))
        .cloned()
        .collect()
}

fn color_of(lower: &str) -> Option<[f64; 3]> {
    let mut found: Vec<[f64; 3]> = Vec::new();
    for word in WORD.find_iter(lower) {
        if let Some((_, rgb)) = COLORS.iter().find(|(name, _)| *name == word.as_str()) {
            if !found.contains(rgb) {
                found.push(*rgb);
            }
        }
    }
    match found.as_slice() {
        [] => None,
        [single] => Some(*single),
        _ => Some(AMBIGUOUS_COLOR),
    }
}

/// First two 4-digit numerals in order of appearance.
fn replacement_pair(prompt: &str) -> Option<(String, String)> {
    let mut tokens = FOUR_DIGIT_TOKEN.find_iter(prompt).map(|m| m.as_str().to_string());
    let old = tokens.next()?;
    let new = tokens.next()?;
    Some((old, new))
}
