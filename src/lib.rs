//! # docreview
//!
//! LLM Document Review & Response Normalization Pipeline - Rust Microservice
//!
//! ## Modules
//!
//! - [`normalizer`] - Malformed-JSON repair and model-response normalization
//! - [`provider`] - Completion provider abstraction and HTTP client
//! - [`review`] - LLM-based document review service
//! - [`prompts`] - Prompt templates for analysis and repair
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docreview::normalizer;
//! use docreview::provider::{HttpCompletionProvider, ProviderConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProviderConfig::new("https://api.openai.com/v1", "sk-key", "gpt-4o-mini")?;
//!     let provider = HttpCompletionProvider::new(config)?;
//!     let raw = "```json\n{'score': 4}\n```";
//!     match normalizer::normalize(raw, &provider).await {
//!         Ok(record) => println!("score: {:?}", record.fields.get("score")),
//!         Err(failure) => println!("unrepairable: {}", failure.reason.name()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod normalizer;
pub mod prompts;
pub mod provider;
pub mod review;

pub use error::{DocreviewError, Result};
pub use normalizer::{
    FailureReason, NormalizationFailure, NormalizedRecord, RepairAttempt, RepairMode,
    RepairTransform,
};
