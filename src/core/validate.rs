//! Variant Validator
//!
//! Multi-layer acceptance check for a transform's output. The rules are
//! ordered and the first match wins; the central distinction is rule 4
//! versus rule 5: "this paper has no such section" (skip) must never be
//! conflated with "the removal logic deleted almost everything" (failure).
//! Dataset policies consume the three-way status, not a boolean.

use crate::core::transform::{TransformError, TransformKind, TransformOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-original variant whose trimmed output is shorter than this is a
/// degenerate result: more likely a locator bug than a genuinely tiny paper.
pub const MIN_VARIANT_CHARS: usize = 50;

/// Three-way acceptance status for a transform attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// The transform produced a usable variant.
    #[default]
    Success,
    /// The source document legitimately lacks the targeted section.
    Skip,
    /// The transform errored or produced degenerate output.
    Failure,
}

impl fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantStatus::Success => "success",
            VariantStatus::Skip => "skip",
            VariantStatus::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Classify a transform attempt.
///
/// Ordered rules, first match wins:
/// 1. empty source text → failure
/// 2. transform error → failure
/// 3. unmatched non-original transform → skip
/// 4. degenerate (< [`MIN_VARIANT_CHARS`]) non-original output → failure
/// 5. otherwise → success
pub fn validate(
    original_text: &str,
    kind: &TransformKind,
    outcome: Result<&TransformOutcome, &TransformError>,
) -> VariantStatus {
    if original_text.trim().is_empty() {
        return VariantStatus::Failure;
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => return VariantStatus::Failure,
    };

    if !kind.is_original() && !outcome.matched {
        return VariantStatus::Skip;
    }

    if !kind.is_original() && outcome.text.trim().len() < MIN_VARIANT_CHARS {
        return VariantStatus::Failure;
    }

    VariantStatus::Success
}
