//! Locating a structured diagram payload inside an assistant reply.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

// The lenient parser is only tried on candidates up to this size.
const MAX_JSON5_BYTES: usize = 1 << 20;

/// Which path produced an architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParseSource {
    Structured,
    Text,
}

impl ParseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseSource::Structured => "structured",
            ParseSource::Text => "text",
        }
    }
}

fn diagram_section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"diagram[ \t]+json[^\n]*\n?\s*```[ \t]*(?:json5?)?[ \t]*\n(.*?)```")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("valid regex")
    })
}

fn fenced_json_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"```[ \t]*json5?[ \t]*\n(.*?)```")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("valid regex")
    })
}

/// The JSON object embedded in `text`, if any.
///
/// Looks, in order, at a fenced block under a `Diagram JSON` heading, the first fenced `json`
/// block, and the span from the first `{` to the last `}`. Each candidate is parsed strictly and
/// then with the JSON5 parser (trailing commas, comments, unquoted keys). Only objects count.
pub fn extract_diagram_payload(text: &str) -> Option<Value> {
    let section = diagram_section_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let fenced = fenced_json_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let braces = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    };

    [section, fenced, braces]
        .into_iter()
        .flatten()
        .find_map(parse_object)
}

fn parse_object(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if !candidate.starts_with('{') {
        return None;
    }
    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(strict_err) if candidate.len() <= MAX_JSON5_BYTES => {
            match json5::from_str::<Value>(candidate) {
                Ok(value) => {
                    tracing::debug!(
                        error = %strict_err,
                        "diagram payload accepted by the lenient parser"
                    );
                    value
                }
                Err(err) => {
                    tracing::debug!(error = %err, "diagram payload candidate rejected");
                    return None;
                }
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, "diagram payload candidate rejected");
            return None;
        }
    };
    value.is_object().then_some(value)
}
