//! LLM-based document review service.
//!
//! Feeds document text to the completion provider with the structured
//! evaluation prompts, runs the reply through the response normalizer, and
//! produces flat, CSV-friendly review records. A failed analysis degrades
//! into a zero-score record with an explicit error field; it never aborts
//! the batch or the calling request.

use crate::normalizer;
use crate::prompts::document_review::{self, DEFAULT_CRITERIA, SYSTEM_PROMPT};
use crate::provider::CompletionProvider;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Maximum concurrent review requests
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Minimum document length worth sending to the model.
///
/// Shorter input is answered with a zero-score record before any provider
/// call; the repair pipeline is never invoked on clearly insufficient text.
pub const MIN_ANALYZABLE_CHARS: usize = 500;

/// How deep the model should analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisDepth {
    Quick,
    Standard,
    Detailed,
}

impl AnalysisDepth {
    /// Display name used in prompts and records
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisDepth::Quick => "Quick",
            AnalysisDepth::Standard => "Standard",
            AnalysisDepth::Detailed => "Detailed",
        }
    }

    /// Per-depth prompt instruction
    pub fn instruction(&self) -> &'static str {
        match self {
            AnalysisDepth::Quick => "Provide a concise analysis focusing on key points.",
            AnalysisDepth::Standard => "Provide a balanced analysis with adequate detail.",
            AnalysisDepth::Detailed => {
                "Provide a comprehensive analysis with extensive justifications and examples."
            }
        }
    }

    /// Parse a depth name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quick" => Some(AnalysisDepth::Quick),
            "standard" => Some(AnalysisDepth::Standard),
            "detailed" => Some(AnalysisDepth::Detailed),
            _ => None,
        }
    }
}

/// Review run settings shared across a batch
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub reviewer: String,
    /// Model label recorded into each result
    pub model: String,
    pub criteria: Vec<String>,
    pub depth: AnalysisDepth,
}

impl ReviewOptions {
    /// Names of all built-in criteria
    pub fn default_criteria() -> Vec<String> {
        DEFAULT_CRITERIA.iter().map(|c| c.name.to_string()).collect()
    }
}

/// One document queued for review
#[derive(Debug, Clone)]
pub struct ReviewDocument {
    pub filename: String,
    pub text: String,
}

/// Per-criterion score from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_name: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub justification: String,
}

/// Structured reply the model is prompted to produce
#[derive(Debug, Deserialize)]
struct ModelReview {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    overall_score: f64,
    #[serde(default)]
    confidence_level: f64,
    #[serde(default)]
    criteria_scores: Vec<CriterionScore>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    processing_notes: String,
}

/// Final review result for a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub filename: String,
    pub reviewer: String,
    pub timestamp: String,
    pub model_used: String,
    pub analysis_depth: String,
    pub summary: String,
    pub overall_score: f64,
    pub confidence_level: f64,
    /// Criteria scores as a JSON string for CSV compatibility
    pub criteria_scores: String,
    /// List fields joined with "; " for CSV compatibility
    pub strengths: String,
    pub weaknesses: String,
    pub recommendations: String,
    pub processing_notes: String,
    pub elapsed_secs: f64,
    pub processing_successful: bool,
    pub error: String,
}

impl ReviewRecord {
    fn from_model_review(
        opts: &ReviewOptions,
        filename: &str,
        review: ModelReview,
        elapsed_secs: f64,
    ) -> Self {
        let criteria_scores =
            serde_json::to_string(&review.criteria_scores).unwrap_or_else(|_| "[]".to_string());
        Self {
            filename: filename.to_string(),
            reviewer: opts.reviewer.clone(),
            timestamp: chrono::Local::now().to_rfc3339(),
            model_used: opts.model.clone(),
            analysis_depth: opts.depth.name().to_string(),
            summary: review.summary,
            overall_score: review.overall_score,
            confidence_level: review.confidence_level,
            criteria_scores,
            strengths: review.strengths.join("; "),
            weaknesses: review.weaknesses.join("; "),
            recommendations: review.recommendations.join("; "),
            processing_notes: review.processing_notes,
            elapsed_secs,
            processing_successful: true,
            error: String::new(),
        }
    }

    /// Zero-score record for a document that could not be analyzed
    fn failed(opts: &ReviewOptions, filename: &str, error: &str, elapsed_secs: f64) -> Self {
        Self {
            filename: filename.to_string(),
            reviewer: opts.reviewer.clone(),
            timestamp: chrono::Local::now().to_rfc3339(),
            model_used: opts.model.clone(),
            analysis_depth: opts.depth.name().to_string(),
            summary: format!("Analysis failed: {}", error),
            overall_score: 0.0,
            confidence_level: 0.0,
            criteria_scores: "[]".to_string(),
            strengths: String::new(),
            weaknesses: String::new(),
            recommendations: String::new(),
            processing_notes: String::new(),
            elapsed_secs,
            processing_successful: false,
            error: error.to_string(),
        }
    }
}

/// Review a single document.
///
/// Too-short input short-circuits with a zero-score record before any
/// provider call. Provider errors and unrepairable model output both
/// degrade into failed records; this function never returns an error.
pub async fn review_document<P: CompletionProvider>(
    provider: &P,
    opts: &ReviewOptions,
    filename: &str,
    text: &str,
) -> ReviewRecord {
    let started = Instant::now();

    if text.trim().chars().count() < MIN_ANALYZABLE_CHARS {
        info!(
            filename,
            chars = text.trim().chars().count(),
            "Document below minimum analyzable length"
        );
        return ReviewRecord::failed(
            opts,
            filename,
            normalizer::FailureReason::EmptyOrTrivialInput.name(),
            0.0,
        );
    }

    let user_prompt = document_review::build_user_prompt(&opts.criteria, opts.depth, text);

    let content = match provider.complete(SYSTEM_PROMPT, &user_prompt).await {
        Ok(content) => content,
        Err(e) => {
            warn!(filename, error = %e, "Analysis request failed");
            return ReviewRecord::failed(
                opts,
                filename,
                &e.to_string(),
                started.elapsed().as_secs_f64(),
            );
        }
    };

    match normalizer::normalize(&content, provider).await {
        Ok(record) => {
            match serde_json::from_value::<ModelReview>(serde_json::Value::Object(record.fields)) {
                Ok(review) => {
                    debug!(
                        filename,
                        overall_score = review.overall_score,
                        repairs = record.attempts.len(),
                        "Document reviewed"
                    );
                    ReviewRecord::from_model_review(
                        opts,
                        filename,
                        review,
                        started.elapsed().as_secs_f64(),
                    )
                }
                Err(e) => {
                    warn!(filename, error = %e, "Normalized record did not match review schema");
                    ReviewRecord::failed(
                        opts,
                        filename,
                        &format!("unexpected review fields: {}", e),
                        started.elapsed().as_secs_f64(),
                    )
                }
            }
        }
        Err(failure) => {
            warn!(
                filename,
                reason = failure.reason.name(),
                repairs = failure.attempts.len(),
                "Model output could not be normalized"
            );
            ReviewRecord::failed(
                opts,
                filename,
                failure.reason.name(),
                started.elapsed().as_secs_f64(),
            )
        }
    }
}

/// Review documents concurrently.
///
/// Each document is an independent request; failures are isolated per
/// document and reported in the record, so one bad document never sinks
/// the batch.
pub async fn review_documents<P: CompletionProvider>(
    provider: &P,
    opts: &ReviewOptions,
    docs: &[ReviewDocument],
) -> Vec<ReviewRecord> {
    if docs.is_empty() {
        return Vec::new();
    }

    info!(
        count = docs.len(),
        model = %opts.model,
        depth = opts.depth.name(),
        "Starting document review batch"
    );

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));

    let results: Vec<ReviewRecord> = stream::iter(docs.iter().enumerate())
        .map(|(idx, doc)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                debug!(idx, filename = %doc.filename, "Reviewing document");
                Some(review_document(provider, opts, &doc.filename, &doc.text).await)
            }
        })
        .buffer_unordered(MAX_CONCURRENT_REQUESTS)
        .filter_map(|r| async { r })
        .collect()
        .await;

    let successful = results.iter().filter(|r| r.processing_successful).count();
    info!(
        reviewed = results.len(),
        successful,
        failed = results.len() - successful,
        "Document review batch complete"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DocreviewError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CompletionProvider for FixedProvider {
        async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
            Err(DocreviewError::Api {
                code: 503,
                message: "overloaded".to_string(),
            })
        }
    }

    fn test_options() -> ReviewOptions {
        ReviewOptions {
            reviewer: "tester".to_string(),
            model: "test-model".to_string(),
            criteria: ReviewOptions::default_criteria(),
            depth: AnalysisDepth::Standard,
        }
    }

    fn long_document() -> String {
        "Introduction and methods of the onboarding study. ".repeat(20)
    }

    const VALID_REVIEW: &str = r#"{
        "summary": "A solid onboarding study.",
        "overall_score": 4.5,
        "confidence_level": 90,
        "criteria_scores": [
            {"criterion_name": "Clarity", "score": 4, "confidence": 85, "justification": "Well structured."}
        ],
        "strengths": ["clear aims", "good cohort"],
        "weaknesses": ["small sample"],
        "recommendations": ["expand cohort"],
        "processing_notes": ""
    }"#;

    #[test]
    fn test_depth_round_trip() {
        assert_eq!(AnalysisDepth::from_name("detailed"), Some(AnalysisDepth::Detailed));
        assert_eq!(AnalysisDepth::from_name(" Quick "), Some(AnalysisDepth::Quick));
        assert_eq!(AnalysisDepth::from_name("bogus"), None);
        assert_eq!(AnalysisDepth::Standard.name(), "Standard");
    }

    #[tokio::test]
    async fn test_short_document_skips_provider() {
        let provider = FixedProvider::new(VALID_REVIEW);
        let record = review_document(&provider, &test_options(), "short.txt", "too short").await;
        assert_eq!(provider.calls(), 0);
        assert!(!record.processing_successful);
        assert_eq!(record.overall_score, 0.0);
        assert_eq!(record.error, "empty_or_trivial_input");
    }

    #[tokio::test]
    async fn test_successful_review_maps_fields() {
        let provider = FixedProvider::new(VALID_REVIEW);
        let record =
            review_document(&provider, &test_options(), "study.txt", &long_document()).await;
        assert!(record.processing_successful);
        assert_eq!(record.overall_score, 4.5);
        assert_eq!(record.summary, "A solid onboarding study.");
        assert_eq!(record.strengths, "clear aims; good cohort");
        assert!(record.criteria_scores.contains("Clarity"));
        assert_eq!(record.model_used, "test-model");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_fenced_review_is_repaired() {
        let fenced = format!("```json\n{}\n```", VALID_REVIEW);
        let provider = FixedProvider::new(&fenced);
        let record =
            review_document(&provider, &test_options(), "study.txt", &long_document()).await;
        assert!(record.processing_successful);
        assert_eq!(record.overall_score, 4.5);
        // Deterministic repair, no escalation call
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_unrepairable_output_degrades() {
        // Analysis reply and the escalation fix are both unusable
        let provider = FixedProvider::new("I could not produce the review you asked {");
        let record =
            review_document(&provider, &test_options(), "study.txt", &long_document()).await;
        assert!(!record.processing_successful);
        assert_eq!(record.overall_score, 0.0);
        assert_eq!(record.error, "syntactically_invalid");
        // One analysis call plus exactly one escalation call
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let provider = FailingProvider;
        let record =
            review_document(&provider, &test_options(), "study.txt", &long_document()).await;
        assert!(!record.processing_successful);
        assert!(record.error.contains("API error"));
        assert!(record.summary.starts_with("Analysis failed:"));
    }

    #[tokio::test]
    async fn test_batch_reviews_all_documents() {
        let provider = FixedProvider::new(VALID_REVIEW);
        let docs = vec![
            ReviewDocument {
                filename: "a.txt".to_string(),
                text: long_document(),
            },
            ReviewDocument {
                filename: "b.txt".to_string(),
                text: "tiny".to_string(),
            },
        ];
        let records = review_documents(&provider, &test_options(), &docs).await;
        assert_eq!(records.len(), 2);
        let ok = records.iter().filter(|r| r.processing_successful).count();
        assert_eq!(ok, 1);
    }
}
