// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Normalization of tool output into function-response parts.
//!
//! The model only ever sees a tool result as one or more parts under the
//! call's id and tool name.  The conversion is deterministic: a fixed
//! `(tool_name, call_id, llm_content)` always yields the same parts.

use serde_json::{json, Map, Value};

use skarv_model::Part;

use crate::tool::LlmContent;

fn response_part(tool_name: &str, call_id: &str, response: Map<String, Value>) -> Part {
    Part::function_response(call_id, tool_name, response)
}

fn output_response(tool_name: &str, call_id: &str, output: &str) -> Part {
    let mut response = Map::new();
    response.insert("output".into(), json!(output));
    response_part(tool_name, call_id, response)
}

/// Collect the text fields of a nested `content` part list, joined by
/// newlines.  Non-text entries are dropped.
fn flatten_nested_content(content: &Value) -> String {
    let Some(items) = content.as_array() else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a successful tool result into the parts fed back to the model.
pub fn convert_to_function_response(
    tool_name: &str,
    call_id: &str,
    llm_content: &LlmContent,
) -> Vec<Part> {
    let parts = match llm_content {
        LlmContent::Text(text) => return vec![output_response(tool_name, call_id, text)],
        LlmContent::Parts(parts) => parts,
    };

    if parts.len() == 1 {
        match &parts[0] {
            // Already shaped as a function response.  When it nests a content
            // list, flatten the text and re-wrap; otherwise pass it through.
            Part::FunctionResponse(fr) => {
                if let Some(content) = fr.response.get("content") {
                    let text = flatten_nested_content(content);
                    return vec![output_response(tool_name, call_id, &text)];
                }
                return vec![parts[0].clone()];
            }
            Part::InlineData { mime_type, .. } => {
                return vec![
                    output_response(
                        tool_name,
                        call_id,
                        &format!("Binary content of type {mime_type} was processed."),
                    ),
                    parts[0].clone(),
                ];
            }
            Part::Text { text } => return vec![output_response(tool_name, call_id, text)],
            _ => {}
        }
    }

    // Mixed or multi-part output: one synthetic success response, then the
    // original parts verbatim.
    let mut out = Vec::with_capacity(parts.len() + 1);
    out.push(output_response(tool_name, call_id, "Tool execution succeeded."));
    out.extend(parts.iter().cloned());
    out
}

/// Function response carrying an execution error for the model to recover from.
pub fn error_response(tool_name: &str, call_id: &str, message: &str) -> Vec<Part> {
    let mut response = Map::new();
    response.insert("error".into(), json!(message));
    vec![response_part(tool_name, call_id, response)]
}

/// Function response for a cancelled call.
pub fn cancelled_response(tool_name: &str, call_id: &str, reason: &str) -> Vec<Part> {
    let mut response = Map::new();
    response.insert(
        "error".into(),
        json!(format!("[Operation Cancelled] Reason: {reason}")),
    );
    vec![response_part(tool_name, call_id, response)]
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
