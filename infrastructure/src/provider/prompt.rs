//! Prompt rendering for extraction calls.

use coach_application::InvokeRequest;
use coach_domain::{ExtractionSchema, FieldSpec, GoldenExample};
use std::fmt::Write;

pub(crate) const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured data from Swedish \
    housing association (BRF) annual reports. Answer with a single JSON object and nothing else. \
    Use null for values that are not present in the pages.";

pub(crate) const ADVISORY_SYSTEM_PROMPT: &str = "You coach document extraction agents. \
    Answer with a single JSON object and nothing else.";

/// Render the user prompt of one extraction attempt.
///
/// Sections in order: instruction, expected fields, golden examples, pages.
pub fn build_extraction_prompt(request: &InvokeRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(request.instruction.text.trim());
    prompt.push_str("\n\n");

    render_schema(&mut prompt, &request.schema);
    render_examples(&mut prompt, &request.golden_examples);

    prompt.push_str("PAGES:\n");
    if request.pages.is_empty() {
        prompt.push_str("(no page text available)\n");
    }
    for page in &request.pages {
        let _ = writeln!(prompt, "--- Page {} ---\n{}", page.number, page.text.trim());
    }
    prompt
}

fn render_schema(prompt: &mut String, schema: &ExtractionSchema) {
    prompt.push_str("OUTPUT FIELDS:\n");
    if schema.is_open() {
        prompt.push_str("- every field you can identify, with natural JSON types\n\n");
        return;
    }
    for field in &schema.fields {
        let _ = writeln!(prompt, "- {}", describe_field(field));
    }
    prompt.push('\n');
}

fn describe_field(field: &FieldSpec) -> String {
    let mut description = format!("{} ({}", field.name, field.kind);
    if field.required {
        description.push_str(", required");
    }
    if let Some(range) = field.range {
        let _ = write!(description, ", {} to {}", range.min, range.max);
    }
    description.push(')');
    description
}

fn render_examples(prompt: &mut String, examples: &[GoldenExample]) {
    if examples.is_empty() {
        return;
    }
    prompt.push_str("EXAMPLES OF EXCELLENT OUTPUT:\n");
    for (i, example) in examples.iter().enumerate() {
        let payload = serde_json::to_string(&example.payload.fields).unwrap_or_default();
        let _ = writeln!(
            prompt,
            "Example {} ({}, accuracy {:.1}%):\n{}",
            i + 1,
            example.document_id,
            example.score * 100.0,
            payload
        );
    }
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coach_domain::{
        AgentId, DocumentClass, DocumentId, ExtractionPayload, FieldValue, Instruction, PageText,
    };

    fn request(schema: ExtractionSchema, golden: Vec<GoldenExample>) -> InvokeRequest {
        InvokeRequest {
            agent_id: AgentId::new("balance_sheet_agent"),
            document_id: DocumentId::new("brf_002"),
            instruction: Instruction {
                version: 2,
                text: "Extract the balance sheet totals.".into(),
            },
            schema,
            pages: vec![
                PageText::new(7, "Summa tillgångar 12 345 678"),
                PageText::new(8, "Summa eget kapital och skulder 12 345 678"),
            ],
            golden_examples: golden,
        }
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let schema = ExtractionSchema::new(vec![
            FieldSpec::number("total_assets").required().within(0.0, 1e10),
            FieldSpec::text("auditor"),
        ]);
        let prompt = build_extraction_prompt(&request(schema, Vec::new()));

        let instruction = prompt.find("Extract the balance sheet totals.").unwrap();
        let fields = prompt.find("OUTPUT FIELDS:").unwrap();
        let pages = prompt.find("PAGES:").unwrap();
        assert!(instruction < fields && fields < pages);
        assert!(prompt.contains("- total_assets (number, required, 0 to 10000000000)"));
        assert!(prompt.contains("- auditor (text)"));
        assert!(prompt.contains("--- Page 8 ---"));
        assert!(!prompt.contains("EXAMPLES"));
    }

    #[test]
    fn test_prompt_includes_golden_examples() {
        let example = GoldenExample {
            agent_id: AgentId::new("balance_sheet_agent"),
            document_class: DocumentClass::default(),
            document_id: DocumentId::new("brf_001"),
            round: 1,
            payload: ExtractionPayload::new().with_field("total_assets", FieldValue::Number(1000.0)),
            score: 0.97,
            promoted_at: Utc::now(),
        };
        let prompt = build_extraction_prompt(&request(ExtractionSchema::default(), vec![example]));
        assert!(prompt.contains("Example 1 (brf_001, accuracy 97.0%)"));
        assert!(prompt.contains(r#"{"total_assets":1000.0}"#));
        assert!(prompt.contains("every field you can identify"));
    }
}
