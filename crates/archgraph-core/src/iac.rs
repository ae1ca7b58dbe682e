//! Resource extraction from infrastructure-as-code templates.
//!
//! Recognizes Bicep declarations (`resource web 'Microsoft.Web/sites@2023-01-01' = {`) and
//! Terraform blocks (`resource "azurerm_linux_web_app" "web" {`). Bodies are cut out with a brace
//! counter that ignores braces inside string literals and comments. A body never extends past the
//! next declaration, so the bodies of one template never overlap.

use crate::catalog::Catalog;
use crate::config::Limits;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IacDialect {
    #[default]
    Bicep,
    Terraform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IacResource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub full_text: String,
    /// Verbatim body, outer braces included.
    pub body: String,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_service_name: Option<String>,
    #[serde(default)]
    pub dialect: IacDialect,
}

/// A `resource` header found in a template, before its body is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub name: String,
    pub resource_type: String,
    pub api_version: Option<String>,
    pub dialect: IacDialect,
    /// Byte offset of the `resource` keyword.
    pub start: usize,
    /// Byte offset just past the header.
    pub header_end: usize,
}

fn bicep_declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*resource[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]+'([^'@\s]+)(?:@([^'\s]+))?'",
        )
        .expect("valid regex")
    })
}

fn terraform_declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*resource[ \t]+"([^"\s]+)"[ \t]+"([^"\s]+)""#).expect("valid regex")
    })
}

fn property_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*(:|=)").expect("valid regex")
    })
}

/// At most `max` resource headers in `text`, ordered by position.
pub(crate) fn declarations(text: &str, max: usize) -> Vec<Declaration> {
    let mut out: Vec<Declaration> = Vec::new();
    for caps in bicep_declaration_regex().captures_iter(text).take(max) {
        let (Some(m), Some(name), Some(ty)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push(Declaration {
            name: name.as_str().to_string(),
            resource_type: ty.as_str().to_string(),
            api_version: caps.get(3).map(|v| v.as_str().to_string()),
            dialect: IacDialect::Bicep,
            start: keyword_start(text, m.start(), m.end()),
            header_end: m.end(),
        });
    }
    for caps in terraform_declaration_regex().captures_iter(text).take(max) {
        let (Some(m), Some(ty), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push(Declaration {
            name: name.as_str().to_string(),
            resource_type: ty.as_str().to_string(),
            api_version: None,
            dialect: IacDialect::Terraform,
            start: keyword_start(text, m.start(), m.end()),
            header_end: m.end(),
        });
    }
    out.sort_by_key(|d| d.start);
    if out.len() > max {
        tracing::warn!(max, "resource declarations truncated");
        out.truncate(max);
    }
    out
}

fn keyword_start(text: &str, start: usize, end: usize) -> usize {
    let matched = &text[start..end];
    start + (matched.len() - matched.trim_start().len())
}

/// Extracts the declared resources, at most `limits.max_resources` of them. Empty or
/// whitespace-only input yields an empty list.
///
/// An unterminated body ends where the next declaration starts (or at the end of the input).
pub fn extract_resources(text: &str, catalog: &Catalog, limits: &Limits) -> Vec<IacResource> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let decls = declarations(text, limits.max_resources);
    let mut out = Vec::with_capacity(decls.len());
    for (idx, decl) in decls.iter().enumerate() {
        let search_end = decls
            .get(idx + 1)
            .map(|d| d.start)
            .unwrap_or(text.len())
            .max(decl.header_end);
        let Some(open) = text[decl.header_end..search_end]
            .find('{')
            .map(|rel| decl.header_end + rel)
        else {
            tracing::debug!(name = %decl.name, "resource declaration without a body");
            continue;
        };

        let body_end = match find_matching_brace(text, open, search_end, decl.dialect) {
            Some(close) => close + 1,
            None => {
                tracing::debug!(
                    name = %decl.name,
                    "unterminated resource body; cut at the next declaration"
                );
                search_end
            }
        };
        let body = &text[open..body_end];
        let full_text = &text[decl.start..body_end];

        let def = catalog.resolve(&decl.resource_type);
        out.push(IacResource {
            name: decl.name.clone(),
            resource_type: decl.resource_type.clone(),
            api_version: decl.api_version.clone(),
            full_text: full_text.to_string(),
            body: body.to_string(),
            properties: top_level_properties(body, decl.dialect),
            catalog_title: def.map(|d| d.title.clone()),
            catalog_service_name: def.map(|d| d.canonical_name().to_string()),
            dialect: decl.dialect,
        });
    }
    out
}

/// Index of the `}` closing the `{` at `open`, looking no further than `end`.
pub(crate) fn find_matching_brace(
    text: &str,
    open: usize,
    end: usize,
    dialect: IacDialect,
) -> Option<usize> {
    let bytes = text.as_bytes();
    let end = end.min(bytes.len());
    let mut depth = 0usize;
    let mut scanner = Scanner::new(dialect);
    let mut i = open;
    while i < end {
        match scanner.step(bytes, i) {
            Step::Skip(next) => {
                i = next;
                continue;
            }
            Step::Code(b'{') => depth += 1,
            Step::Code(b'}') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            Step::Code(_) | Step::InString => {}
        }
        i += 1;
    }
    None
}

/// Property names declared directly inside `body` (outer braces included), in first-seen order.
///
/// One scanner runs over the whole body, so strings spanning lines (Bicep `'''` blocks) and block
/// comments keep their state; a line is only considered when it starts at depth zero in code.
pub(crate) fn top_level_properties(body: &str, dialect: IacDialect) -> Vec<String> {
    let inner = body.strip_prefix('{').unwrap_or(body);
    let inner = inner.strip_suffix('}').unwrap_or(inner);
    let bytes = inner.as_bytes();

    let mut out: Vec<String> = Vec::new();
    let mut scanner = Scanner::new(dialect);
    let mut depth: i64 = 0;
    let mut cursor = 0usize;
    let mut line_start = 0usize;
    for line in inner.split_inclusive('\n') {
        let line_end = line_start + line.len();
        let in_code = cursor <= line_start && !scanner.in_string();
        if depth <= 0 && in_code {
            if let Some(name) = property_name(line) {
                if !out.iter().any(|p| p == name) {
                    out.push(name.to_string());
                }
            }
        }

        while cursor < line_end {
            match scanner.step(bytes, cursor) {
                Step::Skip(next) => {
                    cursor = next;
                    continue;
                }
                Step::Code(b'{') => depth += 1,
                Step::Code(b'}') => depth -= 1,
                Step::Code(_) | Step::InString => {}
            }
            cursor += 1;
        }
        line_start = line_end;
    }
    out
}

/// `name` for a `name:` or `name =` line; `==` comparisons do not count.
fn property_name(line: &str) -> Option<&str> {
    let caps = property_line_regex().captures(line)?;
    let whole = caps.get(0)?;
    if line[whole.end()..].starts_with('=') {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

enum Step {
    Code(u8),
    InString,
    /// Jump to this index (comment skipped).
    Skip(usize),
}

/// Byte-level lexer state shared by the brace counters: tracks the open quote character and
/// backslash escapes, and skips comments outside strings.
struct Scanner {
    dialect: IacDialect,
    quote: Option<u8>,
    escaped: bool,
}

impl Scanner {
    fn new(dialect: IacDialect) -> Self {
        Self {
            dialect,
            quote: None,
            escaped: false,
        }
    }

    fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    fn step(&mut self, bytes: &[u8], i: usize) -> Step {
        let b = bytes[i];
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == q {
                self.quote = None;
            }
            return Step::InString;
        }

        match b {
            b'"' | b'\'' => {
                self.quote = Some(b);
                Step::InString
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => Step::Skip(skip_line(bytes, i)),
            b'#' if self.dialect == IacDialect::Terraform => Step::Skip(skip_line(bytes, i)),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut j = i + 2;
                while j + 1 < bytes.len() && !(bytes[j] == b'*' && bytes[j + 1] == b'/') {
                    j += 1;
                }
                Step::Skip((j + 2).min(bytes.len()))
            }
            other => Step::Code(other),
        }
    }
}

fn skip_line(bytes: &[u8], i: usize) -> usize {
    let mut j = i;
    while j < bytes.len() && bytes[j] != b'\n' {
        j += 1;
    }
    j
}
