//! Document evaluation prompts for structured review.
//!
//! Contains the system prompt, the built-in criteria catalog with 0-5
//! scoring guides, and the user prompt builder that emits the strict JSON
//! output schema the normalizer expects back.

use crate::review::AnalysisDepth;

/// System prompt for document analysis
pub const SYSTEM_PROMPT: &str = "You are an expert document reviewer with extensive knowledge across multiple domains. Provide thorough, objective analysis in JSON format with detailed justifications for each score.";

/// One evaluation criterion with its 0-5 scoring guide
#[derive(Debug, Clone, Copy)]
pub struct Criterion {
    pub name: &'static str,
    pub description: &'static str,
    pub guide: &'static str,
}

/// Built-in evaluation criteria
pub const DEFAULT_CRITERIA: &[Criterion] = &[
    Criterion {
        name: "Clarity",
        description: "How clearly the document presents its content, objectives, and conclusions",
        guide: "5: Crystal clear, excellent structure\n4: Clear with minor issues\n3: Generally clear\n2: Some unclear sections\n1: Mostly unclear\n0: Very confusing",
    },
    Criterion {
        name: "Relevance",
        description: "How relevant the content is to its stated purpose and target audience",
        guide: "5: Highly relevant and applicable\n4: Very relevant\n3: Moderately relevant\n2: Somewhat relevant\n1: Limited relevance\n0: Not relevant",
    },
    Criterion {
        name: "Quality",
        description: "Overall quality including accuracy, depth, and comprehensiveness",
        guide: "5: Exceptional quality\n4: High quality\n3: Good quality\n2: Acceptable quality\n1: Poor quality\n0: Very poor quality",
    },
    Criterion {
        name: "Evidence",
        description: "Quality and adequacy of supporting evidence and references",
        guide: "5: Excellent evidence with comprehensive citations\n4: Good evidence quality\n3: Adequate evidence\n2: Limited evidence\n1: Weak evidence\n0: No supporting evidence",
    },
    Criterion {
        name: "Methodology",
        description: "Quality of research methodology and study design",
        guide: "5: Rigorous methodology, well-designed\n4: Good methodology\n3: Acceptable design\n2: Some methodological issues\n1: Poor methodology\n0: Major methodological flaws",
    },
];

/// Look up a built-in criterion by name (case-insensitive).
pub fn find_criterion(name: &str) -> Option<&'static Criterion> {
    DEFAULT_CRITERIA
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Build the user prompt for one document analysis.
///
/// Unknown criterion names are kept in the prompt as custom criteria, so
/// callers can score against criteria the catalog does not know about.
pub fn build_user_prompt(criteria: &[String], depth: AnalysisDepth, document_text: &str) -> String {
    let criteria_details: Vec<String> = criteria
        .iter()
        .map(|name| match find_criterion(name) {
            Some(c) => format!("- **{}**: {}\n  - **Guide:** {}", c.name, c.description, c.guide),
            None => format!("- **{}**: Custom criterion", name.trim()),
        })
        .collect();
    let criteria_text = criteria_details.join("\n");

    format!(
        r#"Please analyze the following document and provide a structured evaluation based on these specific criteria:

{criteria_text}

Analysis Depth: {depth}
Instructions: {depth_instruction}

For each criterion, provide:
1. A score according to the guide provided by the criterion
2. A brief justification explaining the score
3. The confidence level of your assessment (0-100)

Additionally, provide:
- A concise summary of the document's main points
- Key strengths of the document
- Areas for improvement or weaknesses
- Specific recommendations for enhancement
- An overall quality assessment
- Confidence level for your analysis (0-100)

Output your analysis only in JSON format with this structure:
{{
    "summary": "document_summary",
    "overall_score": overall_numeric_score,
    "confidence_level": confidence_percentage,
    "criteria_scores": [
        {{"criterion_name": "name", "score": score, "confidence": confidence, "justification": "justify your score"}}
    ],
    "strengths": ["strength1", "strength2"],
    "weaknesses": ["weakness1", "weakness2"],
    "recommendations": ["recommendation1", "recommendation2"],
    "processing_notes": "any_additional_observations"
}}
Follow this format strictly and ensure all fields are included. BE FACTUAL AND DO NOT FABRICATE. If a criterion is not applicable, assign a score of 0 and provide a justification explaining why it does not apply.
Do not include any additional text outside of the JSON structure nor mark the json area.

Document:
{document_text}"#,
        criteria_text = criteria_text,
        depth = depth.name(),
        depth_instruction = depth.instruction(),
        document_text = document_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_criterion_is_case_insensitive() {
        assert!(find_criterion("clarity").is_some());
        assert!(find_criterion(" Evidence ").is_some());
        assert!(find_criterion("nonexistent").is_none());
    }

    #[test]
    fn test_build_user_prompt_includes_guides_and_document() {
        let criteria = vec!["Clarity".to_string(), "Novelty".to_string()];
        let prompt = build_user_prompt(&criteria, AnalysisDepth::Detailed, "the document body");
        assert!(prompt.contains("Crystal clear, excellent structure"));
        assert!(prompt.contains("- **Novelty**: Custom criterion"));
        assert!(prompt.contains("Analysis Depth: Detailed"));
        assert!(prompt.contains("the document body"));
        assert!(prompt.contains("\"criteria_scores\""));
    }
}
