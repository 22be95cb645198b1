//! Prompt module for LLM-based operations.
//!
//! This module provides modular prompt templates for various LLM tasks.

pub mod document_review;
pub mod json_repair;
