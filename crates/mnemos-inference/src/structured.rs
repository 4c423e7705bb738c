//! Structured command interpretation on top of a plain text generation backend.
//!
//! The prompt carries the output schema; the reply is expected to contain one
//! JSON object, possibly wrapped in prose or a fenced block. Parsing is
//! lenient about field spelling and numeric encodings but strict about the
//! presence of a JSON object.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument, warn};

use mnemos_core::{
    CommandIntent, Error, GenerationBackend, GenerationRequest, Result, StructuredGenerator,
    StructuredResponse,
};

/// [`StructuredGenerator`] backed by any [`GenerationBackend`].
pub struct JsonStructuredGenerator<G: GenerationBackend> {
    backend: G,
}

impl<G: GenerationBackend> JsonStructuredGenerator<G> {
    pub fn new(backend: G) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }
}

/// System prompt: instructions followed by the schema the reply must satisfy.
pub fn render_system_prompt(request: &GenerationRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.output_schema)
        .unwrap_or_else(|_| request.output_schema.to_string());
    format!(
        "{}\n\nRespond with a single JSON object matching this schema:\n{}",
        request.system_instructions.trim_end(),
        schema
    )
}

/// User prompt: retrieved context followed by the query.
pub fn render_user_prompt(request: &GenerationRequest) -> String {
    let context = if request.context.trim().is_empty() {
        "No additional context"
    } else {
        request.context.as_str()
    };
    format!("Context:\n{}\n\nUser query: {}", context, request.user_query)
}

#[async_trait]
impl<G: GenerationBackend> StructuredGenerator for JsonStructuredGenerator<G> {
    #[instrument(skip(self, request), fields(subsystem = "inference", component = "structured", op = "generate_structured", model = self.backend.model_name()))]
    async fn generate_structured(&self, request: &GenerationRequest) -> Result<StructuredResponse> {
        let reply = self
            .backend
            .generate_with_system(&render_system_prompt(request), &render_user_prompt(request))
            .await?;

        let response = parse_structured_response(&reply)?;
        debug!(
            intent = %response.intent,
            confidence = response.confidence,
            "Parsed structured response"
        );
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    confidence: Option<JsonValue>,
    #[serde(default)]
    entities: Option<JsonValue>,
    #[serde(default, alias = "suggested_response")]
    #[serde(rename = "suggestedResponse")]
    suggested_response: Option<String>,
    #[serde(default, alias = "requires_confirmation")]
    #[serde(rename = "requiresConfirmation")]
    requires_confirmation: Option<bool>,
}

/// Parse a model reply into a [`StructuredResponse`].
///
/// Fails with [`Error::Inference`] when the reply holds no JSON object.
pub fn parse_structured_response(reply: &str) -> Result<StructuredResponse> {
    let json = extract_json_object(reply).ok_or_else(|| {
        Error::Inference("Generation reply contains no JSON object".to_string())
    })?;

    let raw: RawResponse = serde_json::from_str(json)
        .map_err(|e| Error::Inference(format!("Malformed structured reply: {}", e)))?;

    let intent = raw
        .intent
        .as_deref()
        .map(parse_intent)
        .unwrap_or(CommandIntent::Unknown);
    if intent == CommandIntent::Unknown {
        if let Some(ref other) = raw.intent {
            warn!(intent = %other, "Unrecognized intent, using UNKNOWN");
        }
    }

    let entities = match raw.entities {
        Some(JsonValue::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(StructuredResponse {
        intent,
        confidence: parse_confidence(raw.confidence.as_ref()),
        entities,
        suggested_response: raw.suggested_response.unwrap_or_default(),
        requires_confirmation: raw.requires_confirmation.unwrap_or(false),
    })
}

/// Case- and separator-insensitive intent lookup.
pub fn parse_intent(raw: &str) -> CommandIntent {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    CommandIntent::ALL
        .into_iter()
        .find(|i| i.as_str() == normalized)
        .unwrap_or(CommandIntent::Unknown)
}

fn parse_confidence(raw: Option<&JsonValue>) -> f32 {
    let value = match raw {
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(percent) => percent.trim().parse::<f64>().map_or(0.0, |v| v / 100.0),
                None => s.parse::<f64>().unwrap_or(0.0),
            }
        }
        _ => 0.0,
    };
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}

/// Slice of the first balanced `{...}` object in `text`.
///
/// Braces inside JSON strings are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
