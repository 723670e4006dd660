//! Batched prompt rendering
//!
//! One prompt carries every field of the form, so the backend is called once
//! per form per scenario no matter how many fields there are.

use crate::field::{FieldDescriptor, GenerationRequest};
use serde::Serialize;
use std::fmt::Write;

/// Instruction prepended to every batched prompt
pub const SYSTEM_INSTRUCTION: &str = "You generate test data for web forms. \
Answer with a single JSON object whose keys are exactly the field names given \
and whose values are strings. Do not add commentary.";

#[derive(Serialize)]
struct PromptField<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    semantic_type: &'static str,
    required: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    hint: &'a str,
}

impl<'a> From<&'a FieldDescriptor> for PromptField<'a> {
    fn from(field: &'a FieldDescriptor) -> Self {
        Self {
            name: &field.name,
            semantic_type: field.semantic_type.as_str(),
            required: field.required,
            hint: &field.context_hint,
        }
    }
}

/// Render the user prompt for a batched request.
#[must_use]
pub fn render(request: &GenerationRequest) -> String {
    let mut out = String::with_capacity(256 + request.fields.len() * 96);

    let _ = writeln!(out, "Scenario: {}", request.scenario);
    let _ = writeln!(out, "{}", request.scenario.intent());
    out.push('\n');

    out.push_str("Fields:\n");
    for field in &request.fields {
        let line = serde_json::to_string(&PromptField::from(field))
            .unwrap_or_else(|_| format!("{{\"name\":\"{}\"}}", field.name));
        let _ = writeln!(out, "- {line}");
    }

    if let Some(context) = request.page_context.as_ref().filter(|c| !c.is_empty()) {
        out.push_str("\nThe page shows the following; reuse displayed credentials verbatim:\n");
        for cred in &context.credentials {
            let _ = writeln!(out, "- {}: {}", cred.kind, cred.value);
        }
        for line in &context.instructions {
            let _ = writeln!(out, "- {line}");
        }
    }

    out.push_str("\nReturn one JSON object mapping every field name above to a string value.");
    if request.fields.iter().any(|f| f.required) {
        out.push_str(" Required fields must be present.");
    }
    out
}
