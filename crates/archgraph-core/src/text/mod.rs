//! Best-effort extraction from free-text assistant replies.
//!
//! Four independent scans run over the same text: catalog mentions, relationship verbs
//! (`X talks to Y`), arrows (`X -> Y`) and infrastructure `dependsOn` lists, plus a scan for
//! provider resource-type literals. Each scan stops after `Limits::max_matches` raw matches.
//! Overlaps between the families are resolved by [`architecture_from_text`], which keys every
//! entity by id.

mod build;
mod patterns;
mod relationships;

pub use build::architecture_from_text;
pub use relationships::{RelationshipTemplate, synthesize_connections};

use crate::catalog::{Catalog, ServiceDefinition};
use crate::config::Limits;
use crate::iac;
use patterns::{
    arrow_label, arrow_regex, depends_on_regex, left_entity, phrase_words, resource_type_regex,
    right_entity, verb_regex,
};
use rustc_hash::FxHashSet;
use serde::Serialize;

const DEPENDS_ON_LABEL: &str = "depends on";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    Verb,
    Arrow,
    DependsOn,
}

/// One end of a candidate connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// Canonical catalog title when resolved, the cleaned phrase otherwise.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    /// Text the endpoint was read from.
    pub phrase: String,
}

impl EntityRef {
    fn resolved(def: &ServiceDefinition, phrase: impl Into<String>) -> Self {
        Self {
            title: def.title.clone(),
            definition_id: Some(def.id.clone()),
            phrase: phrase.into(),
        }
    }

    fn unresolved(phrase: String) -> Self {
        Self {
            title: phrase.clone(),
            definition_id: None,
            phrase,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.definition_id.is_some()
    }

    fn same_entity(&self, other: &EntityRef) -> bool {
        match (&self.definition_id, &other.definition_id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.title.eq_ignore_ascii_case(&other.title),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMention {
    pub title: String,
    pub definition_id: String,
    pub matched: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateConnection {
    pub from: EntityRef,
    pub to: EntityRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: PatternKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeToken {
    pub token: String,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
}

/// A `dependsOn` entry, attributed to the closest preceding resource declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub target: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExtraction {
    pub mentions: Vec<ServiceMention>,
    pub connections: Vec<CandidateConnection>,
    pub resource_types: Vec<ResourceTypeToken>,
    pub dependencies: Vec<DependencyRef>,
    /// Set when any scan hit `Limits::max_matches`.
    pub truncated: bool,
}

/// Runs every pattern family over `text`.
pub fn extract(text: &str, catalog: &Catalog, limits: &Limits) -> TextExtraction {
    let mut out = TextExtraction::default();
    if text.trim().is_empty() {
        return out;
    }
    scan_mentions(text, catalog, limits, &mut out);
    scan_verbs(text, catalog, limits, &mut out);
    scan_arrows(text, catalog, limits, &mut out);
    scan_dependencies(text, catalog, limits, &mut out);
    scan_resource_types(text, catalog, limits, &mut out);
    out
}

/// Collects at most `max` items, flagging truncation when more were available.
fn capped<I: Iterator>(
    iter: I,
    max: usize,
    family: &'static str,
    truncated: &mut bool,
) -> Vec<I::Item> {
    let mut out = Vec::new();
    for item in iter {
        if out.len() >= max {
            *truncated = true;
            tracing::warn!(family, max, "pattern matches truncated");
            break;
        }
        out.push(item);
    }
    out
}

fn scan_mentions(text: &str, catalog: &Catalog, limits: &Limits, out: &mut TextExtraction) {
    let Some(re) = catalog.mention_regex() else {
        return;
    };
    for m in capped(re.find_iter(text), limits.max_matches, "mention", &mut out.truncated) {
        let Some(def) = catalog.resolve_mention(m.as_str()) else {
            continue;
        };
        tracing::trace!(matched = m.as_str(), title = %def.title, "service mention");
        out.mentions.push(ServiceMention {
            title: def.title.clone(),
            definition_id: def.id.clone(),
            matched: m.as_str().to_string(),
            offset: m.start(),
        });
    }
}

/// Resolves the shortest trailing run of words that the catalog recognizes, so the entity closest
/// to the verb or arrow wins.
fn resolve_suffix<'c>(catalog: &'c Catalog, words: &[&str]) -> Option<&'c ServiceDefinition> {
    (1..=words.len()).find_map(|k| catalog.resolve(&words[words.len() - k..].join(" ")))
}

fn resolve_prefix<'c>(catalog: &'c Catalog, words: &[&str]) -> Option<&'c ServiceDefinition> {
    (1..=words.len()).find_map(|k| catalog.resolve(&words[..k].join(" ")))
}

fn trailing<'a, 'w>(words: &'a [&'w str], max: usize) -> &'a [&'w str] {
    &words[words.len().saturating_sub(max)..]
}

fn leading<'a, 'w>(words: &'a [&'w str], max: usize) -> &'a [&'w str] {
    &words[..words.len().min(max)]
}

fn scan_verbs(text: &str, catalog: &Catalog, limits: &Limits, out: &mut TextExtraction) {
    let matches = capped(
        verb_regex().captures_iter(text),
        limits.max_matches,
        "verb",
        &mut out.truncated,
    );
    for caps in matches {
        let (Some(whole), Some(subject), Some(verb), Some(object)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let subject_words = phrase_words(subject.as_str());
        let object_words = phrase_words(object.as_str());
        let subject_words = trailing(&subject_words, limits.max_phrase_words);
        let object_words = leading(&object_words, limits.max_phrase_words);

        let (Some(from), Some(to)) = (
            resolve_suffix(catalog, subject_words),
            resolve_prefix(catalog, object_words),
        ) else {
            tracing::trace!(phrase = whole.as_str(), "verb phrase with an unresolved endpoint");
            continue;
        };
        if from.id == to.id {
            continue;
        }
        let label = verb
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        out.connections.push(CandidateConnection {
            from: EntityRef::resolved(from, subject_words.join(" ")),
            to: EntityRef::resolved(to, object_words.join(" ")),
            label: Some(label),
            kind: PatternKind::Verb,
            offset: whole.start(),
        });
    }
}

fn arrow_endpoint(
    catalog: &Catalog,
    words: &[&str],
    resolve: for<'c> fn(&'c Catalog, &[&str]) -> Option<&'c ServiceDefinition>,
    stub: bool,
) -> Option<EntityRef> {
    if words.is_empty() {
        return None;
    }
    let phrase = words.join(" ");
    match resolve(catalog, words) {
        Some(def) => Some(EntityRef::resolved(def, phrase)),
        None if stub => Some(EntityRef::unresolved(phrase)),
        None => None,
    }
}

fn scan_arrows(text: &str, catalog: &Catalog, limits: &Limits, out: &mut TextExtraction) {
    let mut pairs = 0usize;
    let mut line_start = 0usize;
    for line in text.split_inclusive('\n') {
        let offset = line_start;
        line_start += line.len();
        if !arrow_regex().is_match(line) {
            continue;
        }

        let mut segments: Vec<&str> = Vec::new();
        let mut labels: Vec<Option<String>> = Vec::new();
        for (idx, raw) in arrow_regex().split(line).enumerate() {
            let (label, rest) = if idx == 0 { (None, raw) } else { arrow_label(raw) };
            segments.push(rest);
            labels.push(label);
        }

        for idx in 0..segments.len().saturating_sub(1) {
            if pairs >= limits.max_matches {
                out.truncated = true;
                tracing::warn!(
                    family = "arrow",
                    max = limits.max_matches,
                    "pattern matches truncated"
                );
                return;
            }
            pairs += 1;

            let left = left_entity(segments[idx]);
            let right = right_entity(segments[idx + 1]);
            let left_words = phrase_words(&left);
            let right_words = phrase_words(&right);
            let from = arrow_endpoint(
                catalog,
                trailing(&left_words, limits.max_phrase_words),
                resolve_suffix,
                limits.stub_arrow_endpoints,
            );
            let to = arrow_endpoint(
                catalog,
                leading(&right_words, limits.max_phrase_words),
                resolve_prefix,
                limits.stub_arrow_endpoints,
            );
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            if from.same_entity(&to) {
                continue;
            }
            out.connections.push(CandidateConnection {
                from,
                to,
                label: labels[idx + 1].clone(),
                kind: PatternKind::Arrow,
                offset,
            });
        }
    }
}

fn scan_dependencies(text: &str, catalog: &Catalog, limits: &Limits, out: &mut TextExtraction) {
    let matches = capped(
        depends_on_regex().captures_iter(text),
        limits.max_matches,
        "dependsOn",
        &mut out.truncated,
    );
    if matches.is_empty() {
        return;
    }
    let decls = iac::declarations(text, limits.max_resources);

    for caps in matches {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if list.as_str().len() > limits.max_dependency_list_bytes {
            tracing::debug!(bytes = list.as_str().len(), "oversized dependsOn list skipped");
            continue;
        }
        let owner = decls.iter().rev().find(|d| d.start < whole.start());
        let owner_def = owner.and_then(|d| catalog.resolve(&d.resource_type));

        for token in list
            .as_str()
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.')))
            .filter(|t| !t.is_empty())
        {
            out.dependencies.push(DependencyRef {
                owner: owner.map(|d| d.name.clone()),
                target: token.to_string(),
                offset: whole.start(),
            });

            let (head, tail) = match token.split_once('.') {
                Some((head, tail)) => (head, tail.split('.').next().unwrap_or("")),
                None => (token, ""),
            };
            let target = decls
                .iter()
                .find(|d| d.resource_type == head && d.name == tail)
                .or_else(|| decls.iter().find(|d| d.name == head));
            let (Some(owner), Some(from), Some(target)) = (owner, owner_def, target) else {
                continue;
            };
            let Some(to) = catalog.resolve(&target.resource_type) else {
                continue;
            };
            if from.id == to.id {
                continue;
            }
            out.connections.push(CandidateConnection {
                from: EntityRef::resolved(from, owner.name.clone()),
                to: EntityRef::resolved(to, target.name.clone()),
                label: Some(DEPENDS_ON_LABEL.to_string()),
                kind: PatternKind::DependsOn,
                offset: whole.start(),
            });
        }
    }
}

fn scan_resource_types(text: &str, catalog: &Catalog, limits: &Limits, out: &mut TextExtraction) {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let matches = capped(
        resource_type_regex().find_iter(text),
        limits.max_matches,
        "resourceType",
        &mut out.truncated,
    );
    for m in matches {
        if !seen.insert(m.as_str().to_ascii_lowercase()) {
            continue;
        }
        let def = catalog.resolve(m.as_str());
        out.resource_types.push(ResourceTypeToken {
            token: m.as_str().to_string(),
            offset: m.start(),
            title: def.map(|d| d.title.clone()),
            definition_id: def.map(|d| d.id.clone()),
        });
    }
}
