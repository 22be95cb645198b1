//! Model-response normalization pipeline.
//!
//! Turns raw language-model output that is *supposed* to contain a JSON
//! object into a validated structured record. The pipeline runs a staged
//! fallback chain: syntactic validation, cheap deterministic text repairs,
//! then a bounded one-shot model-based fix. Exactly one of
//! [`NormalizedRecord`] or [`NormalizationFailure`] is produced per call;
//! malformed input is a modeled outcome, never a panic or error.
//!
//! Each call is stateless and holds no shared resources, so concurrent
//! callers need no coordination. The only suspension point is the provider
//! call during escalation.

pub mod escalation;
pub mod repair;
pub mod validator;

pub use repair::{RepairAttempt, RepairTransform};

use crate::provider::CompletionProvider;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Whether the repair chain may escalate to a model-based fix.
///
/// The escalation call's own output must never re-enter escalation; passing
/// the mode explicitly makes that non-recursion invariant structural rather
/// than convention-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    /// Full chain: deterministic transforms, then one model-based fix
    WithEscalation,
    /// Deterministic transforms only
    DeterministicOnly,
}

/// Terminal successful output: a parsed top-level JSON object.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// Top-level key/value fields of the parsed object
    pub fields: Map<String, Value>,
    /// Ordered audit trail of the repairs that ran (empty if none were needed)
    pub attempts: Vec<RepairAttempt>,
}

/// Reason code attached to a [`NormalizationFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Input never became valid JSON, or valid JSON was not a top-level object
    SyntacticallyInvalid,
    /// The escalation call to the completion provider failed
    ProviderFailure,
    /// Input was empty or below any usable length
    EmptyOrTrivialInput,
}

impl FailureReason {
    /// Stable name used in logs and caller-facing error fields
    pub fn name(&self) -> &'static str {
        match self {
            FailureReason::SyntacticallyInvalid => "syntactically_invalid",
            FailureReason::ProviderFailure => "provider_failure",
            FailureReason::EmptyOrTrivialInput => "empty_or_trivial_input",
        }
    }
}

/// Terminal failure output, produced only after every repair stage
/// (including escalation, when enabled) has been exhausted.
#[derive(Debug, Clone)]
pub struct NormalizationFailure {
    /// The final, still-invalid string
    pub final_text: String,
    /// Ordered audit trail of every repair tried
    pub attempts: Vec<RepairAttempt>,
    /// Why normalization failed
    pub reason: FailureReason,
}

/// Outcome of one normalization call.
pub type NormalizeResult = std::result::Result<NormalizedRecord, NormalizationFailure>;

/// Normalize raw model output into a structured record, escalating to a
/// model-based fix if deterministic repairs fail.
pub async fn normalize<P: CompletionProvider>(raw: &str, provider: &P) -> NormalizeResult {
    normalize_with_mode(raw, provider, RepairMode::WithEscalation).await
}

/// Normalize raw model output with an explicit repair mode.
///
/// Stages, in order:
/// 1. Empty input fails immediately with `EmptyOrTrivialInput`.
/// 2. Already-valid input succeeds with zero repair attempts.
/// 3. Deterministic repair chain; the first valid transform output wins.
/// 4. With `RepairMode::WithEscalation`: one provider call to fix the
///    syntax, validated once. The fix output is never re-escalated.
pub async fn normalize_with_mode<P: CompletionProvider>(
    raw: &str,
    provider: &P,
    mode: RepairMode,
) -> NormalizeResult {
    if raw.trim().is_empty() {
        warn!("Normalization input is empty");
        return Err(NormalizationFailure {
            final_text: raw.to_string(),
            attempts: Vec::new(),
            reason: FailureReason::EmptyOrTrivialInput,
        });
    }

    if validator::validate(raw) {
        debug!("Model output is already valid JSON");
        return into_record(raw, Vec::new());
    }

    warn!("Model output is not valid JSON, attempting repair");
    let mut attempts = repair::repair(raw);
    if let Some(success) = attempts.iter().find(|a| a.valid) {
        info!(
            transform = success.transform.name(),
            "Deterministic repair produced valid JSON"
        );
        let repaired = success.output.clone();
        return into_record(&repaired, attempts);
    }

    // The quote swap is a lossy hypothesis; when it did not validate, the
    // fence-stripped text is the last trustworthy form of the input.
    let pre_escalation = attempts
        .first()
        .map(|a| a.output.clone())
        .unwrap_or_else(|| raw.to_string());

    if mode == RepairMode::DeterministicOnly {
        warn!("Deterministic repairs exhausted, escalation disabled");
        return Err(NormalizationFailure {
            final_text: pre_escalation,
            attempts,
            reason: FailureReason::SyntacticallyInvalid,
        });
    }

    match escalation::escalate(&pre_escalation, provider).await {
        Ok(fixed) => {
            let valid = validator::validate(&fixed);
            attempts.push(RepairAttempt {
                transform: RepairTransform::ModelFix,
                input: pre_escalation,
                output: fixed.clone(),
                valid,
            });
            if valid {
                info!("Model-based repair produced valid JSON");
                into_record(&fixed, attempts)
            } else {
                warn!("Model-based repair still yielded invalid JSON");
                Err(NormalizationFailure {
                    final_text: fixed,
                    attempts,
                    reason: FailureReason::SyntacticallyInvalid,
                })
            }
        }
        Err(e) => {
            warn!(error = %e, "Escalation call to completion provider failed");
            attempts.push(RepairAttempt {
                transform: RepairTransform::ModelFix,
                input: pre_escalation.clone(),
                output: pre_escalation.clone(),
                valid: false,
            });
            Err(NormalizationFailure {
                final_text: pre_escalation,
                attempts,
                reason: FailureReason::ProviderFailure,
            })
        }
    }
}

/// Build the terminal record from validated JSON text.
///
/// The record contract requires a top-level object; an empty object is
/// accepted as a degenerate valid case. Valid non-object JSON (array,
/// scalar) is reported as a normalization failure.
fn into_record(text: &str, attempts: Vec<RepairAttempt>) -> NormalizeResult {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => {
            debug!(keys = fields.len(), "Normalization produced a structured record");
            Ok(NormalizedRecord { fields, attempts })
        }
        _ => {
            warn!("Valid JSON was not a top-level object");
            Err(NormalizationFailure {
                final_text: text.to_string(),
                attempts,
                reason: FailureReason::SyntacticallyInvalid,
            })
        }
    }
}
