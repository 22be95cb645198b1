//! Model-based escalation for JSON that deterministic repair cannot fix.
//!
//! Escalation is the last stage of the repair chain: a single completion
//! call whose only job is to correct JSON syntax, not to re-interpret
//! content. The call is one-shot by construction — its output goes back to
//! the validator only and never re-enters the escalation path (see
//! [`crate::normalizer::RepairMode`]).

use crate::error::Result;
use crate::prompts::json_repair;
use crate::provider::CompletionProvider;
use tracing::info;

/// Ask the completion provider to repair `text` into valid JSON.
///
/// Exactly one provider call is made. Provider failures (network, auth,
/// rate limit, malformed response) surface as `Err` and are downgraded to
/// an escalation failure by the caller; they never abort the pipeline.
pub(crate) async fn escalate<P: CompletionProvider>(text: &str, provider: &P) -> Result<String> {
    info!(chars = text.len(), "Escalating to model-based JSON repair");
    let fixed = provider.complete(json_repair::SYSTEM_PROMPT, text).await?;
    Ok(fixed.trim().to_string())
}
