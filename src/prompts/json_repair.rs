//! JSON repair prompt for the escalation call.
//!
//! The escalation model acts purely as a syntax fixer, never a content
//! re-interpreter; the malformed string itself is sent as the user text.

/// System prompt for the one-shot JSON repair call
pub const SYSTEM_PROMPT: &str = r#"You are an expert in fixing malformed JSON strings. Your ONLY job is to repair JSON syntax.

Rules you MUST follow:
- Output ONLY the corrected JSON, nothing else.
- No explanations, no markdown fences, no commentary.
- Preserve all of the original data and structure; do not re-interpret content.
- Fix syntax errors: missing commas, unclosed brackets, invalid escapes, unquoted keys.
- Use \" to escape double quotes inside string values.
- Ensure the JSON is complete, not truncated.

Repair the JSON string you are given and return it."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_forbids_commentary() {
        assert!(SYSTEM_PROMPT.contains("ONLY the corrected JSON"));
        assert!(SYSTEM_PROMPT.contains("no commentary"));
    }

    #[test]
    fn test_system_prompt_scopes_to_syntax() {
        assert!(SYSTEM_PROMPT.contains("do not re-interpret content"));
    }
}
