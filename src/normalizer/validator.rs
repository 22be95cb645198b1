//! Syntactic JSON validity check.
//!
//! The validity check is purely syntactic: objects, arrays and scalars all
//! pass. Whether the document is a usable top-level object is decided later,
//! when the normalizer builds the final record.

/// Check whether `text` parses as syntactically valid JSON.
///
/// Pure function. Every failure mode of the underlying parser is absorbed
/// internally and reported as `false`; no error type escapes to callers.
pub fn validate(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_object() {
        assert!(validate(r#"{"score": 4, "summary": "ok"}"#));
    }

    #[test]
    fn test_valid_array_and_scalars() {
        assert!(validate("[1, 2, 3]"));
        assert!(validate("42"));
        assert!(validate("\"text\""));
        assert!(validate("null"));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(!validate(""));
        assert!(!validate("not json at all"));
        assert!(!validate("{'single': 'quotes'}"));
        assert!(!validate(r#"{"truncated": "#));
    }

    #[test]
    fn test_garbage_never_panics() {
        assert!(!validate("\u{0000}\u{001b}[31m{{{"));
        assert!(!validate("```json\n{\"a\": 1}\n```"));
    }
}
