//! System instructions and the reply schema for command interpretation.

use std::fmt::Write;

use serde_json::{json, Value as JsonValue};

use mnemos_core::{CommandIntent, QueryContext, SearchResult};
use mnemos_search::truncate_chars;

const SUMMARY_DOCUMENTS: usize = 5;
const SUMMARY_CHARS: usize = 100;

/// Instructions for the generation provider, with a short summary of what
/// retrieval found.
pub fn system_instructions(query: &QueryContext, results: &[SearchResult]) -> String {
    let mut out = String::from(
        "You are the assistant of a CRM and task management system with access to the \
         user's knowledge base.\n\
         \n\
         You can:\n\
         - Read the user's projects, tasks, contacts, companies, deals and communications\n\
         - Use semantically retrieved documents as context\n\
         - Suggest actions and link related records\n\
         \n\
         Interpret the user's command, pick exactly one intent and extract its entities. \
         Ask for confirmation before destructive or ambiguous actions.\n",
    );
    let _ = write!(
        out,
        "\nUser context:\n- User: {}\n- Organization: {}\n- Language: {}\n",
        query.user_id,
        query.organization_id,
        query.language.as_deref().unwrap_or("en")
    );

    if !results.is_empty() {
        let _ = writeln!(out, "\nFound {} relevant documents:", results.len());
        for (index, result) in results.iter().take(SUMMARY_DOCUMENTS).enumerate() {
            let _ = writeln!(
                out,
                "{}. [{}] {} ({:.0}% relevance)",
                index + 1,
                result.document.metadata.doc_type.as_str().to_uppercase(),
                truncate_chars(result.document.content.trim(), SUMMARY_CHARS),
                result.relevance_score * 100.0
            );
        }
    }
    out
}

/// JSON schema of a structured reply.
pub fn output_schema() -> JsonValue {
    let intents: Vec<&str> = CommandIntent::ALL.iter().map(|i| i.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "intent": {
                "type": "string",
                "enum": intents,
                "description": "The recognized intent"
            },
            "confidence": {
                "type": "number",
                "minimum": 0,
                "maximum": 1,
                "description": "Confidence score 0-1"
            },
            "entities": {
                "type": "object",
                "description": "Entities extracted from the command"
            },
            "suggestedResponse": {
                "type": "string",
                "description": "Natural response based on the context"
            },
            "requiresConfirmation": {
                "type": "boolean",
                "description": "Whether the user must confirm before execution"
            }
        },
        "required": ["intent", "confidence", "entities", "suggestedResponse"]
    })
}
