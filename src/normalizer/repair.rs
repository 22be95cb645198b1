//! Deterministic syntax repair transforms for model output.
//!
//! Two cheap text transforms cover the failure modes models actually
//! produce: wrapping the JSON in a markdown code fence (often with leading
//! prose), and emitting Python-style dict literals with single quotes.
//! Transforms run in a fixed order and chain: each one operates on the
//! output of the previous failed transform, re-validating after each and
//! short-circuiting at the first valid result.

use crate::normalizer::validator;
use regex::Regex;
use tracing::debug;

/// Identifier for one deterministic or model-based repair transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTransform {
    /// Remove markdown fence markers and surrounding prose
    StripCodeFence,
    /// Replace single quotes with double quotes
    NormalizeQuotes,
    /// One-shot model-based fix (escalation)
    ModelFix,
}

impl RepairTransform {
    /// Stable name used in audit logs
    pub fn name(&self) -> &'static str {
        match self {
            RepairTransform::StripCodeFence => "strip_code_fence",
            RepairTransform::NormalizeQuotes => "normalize_quotes",
            RepairTransform::ModelFix => "model_fix",
        }
    }
}

/// Audit record for one transform application.
///
/// The ordered sequence of attempts is the only diagnostic trail available
/// when a model's output cannot be repaired, so both input and output are
/// retained verbatim.
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    /// Which transform ran
    pub transform: RepairTransform,
    /// String the transform received
    pub input: String,
    /// String the transform produced
    pub output: String,
    /// Whether the output validated as JSON
    pub valid: bool,
}

/// Apply the deterministic repair chain to `text`.
///
/// Returns the ordered attempts log. The chain short-circuits: if a
/// transform's output validates, no further transform runs.
pub fn repair(text: &str) -> Vec<RepairAttempt> {
    let mut attempts = Vec::new();

    let stripped = strip_code_fence(text);
    let valid = validator::validate(&stripped);
    debug!(
        transform = RepairTransform::StripCodeFence.name(),
        valid, "Applied repair transform"
    );
    attempts.push(RepairAttempt {
        transform: RepairTransform::StripCodeFence,
        input: text.to_string(),
        output: stripped.clone(),
        valid,
    });
    if valid {
        return attempts;
    }

    let requoted = normalize_quotes(&stripped);
    let valid = validator::validate(&requoted);
    debug!(
        transform = RepairTransform::NormalizeQuotes.name(),
        valid, "Applied repair transform"
    );
    attempts.push(RepairAttempt {
        transform: RepairTransform::NormalizeQuotes,
        input: stripped,
        output: requoted,
        valid,
    });

    attempts
}

/// Strip markdown code-fence markers and surrounding prose.
///
/// Models frequently wrap JSON in ```` ```json ... ``` ```` blocks, with or
/// without leading chatter ("Sure! ..."). Keep only the fenced content, or
/// the outermost brace window when no fence is present.
pub(crate) fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    let fence_re = Regex::new(r"```(?:json)?")
        .unwrap_or_else(|_| Regex::new("").expect("Empty regex"));
    if let Some(open) = fence_re.find(trimmed) {
        let after = &trimmed[open.end()..];
        let inner = match after.rfind("```") {
            Some(close) => &after[..close],
            None => after,
        };
        return inner.trim().to_string();
    }

    // No fence: keep the outermost brace window to drop leading/trailing prose
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

/// Replace every single-quote character with a double quote.
///
/// Targets Python-style dict literals (`{'a': 1}`). Known limitation:
/// a legitimate apostrophe inside a string value is corrupted too; such
/// output fails re-validation and falls through to escalation.
pub(crate) fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_untagged_fence() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_with_leading_prose() {
        let input = "Sure! ```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_prose_without_fence() {
        let input = "Here is the result: {\"a\": 1} hope it helps";
        assert_eq!(strip_code_fence(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_leaves_plain_text_trimmed() {
        assert_eq!(strip_code_fence("  not json  "), "not json");
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(
            normalize_quotes("{'a': 1, 'b': 'x'}"),
            "{\"a\": 1, \"b\": \"x\"}"
        );
    }

    #[test]
    fn test_repair_short_circuits_after_fence_strip() {
        let attempts = repair("```json\n{\"a\": 1}\n```");
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].transform, RepairTransform::StripCodeFence);
        assert!(attempts[0].valid);
    }

    #[test]
    fn test_repair_chains_quote_normalization_onto_stripped_text() {
        let attempts = repair("```json\n{'a': 1}\n```");
        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].valid);
        // Stage 2 receives stage 1's output, not the original input
        assert_eq!(attempts[1].input, attempts[0].output);
        assert_eq!(attempts[1].transform, RepairTransform::NormalizeQuotes);
        assert!(attempts[1].valid);
        assert_eq!(attempts[1].output, "{\"a\": 1}");
    }

    #[test]
    fn test_repair_records_both_failures() {
        let attempts = repair("definitely not json");
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| !a.valid));
        assert_eq!(attempts[0].input, "definitely not json");
    }
}
