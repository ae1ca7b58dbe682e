use super::{Catalog, ServiceDefinition, lookup_key};
use crate::utils::{
    contains_phrase, normalize_phrase, title_from_icon_id, truncate_at_char_boundary,
};
use regex::{Regex, RegexBuilder};

// Containment matching only looks at this much of a normalized query.
const MAX_CONTAINMENT_QUERY_BYTES: usize = 1024;
// Mention scanning skips very short alternatives (`vm`, `ai`), which are too noisy in prose.
const MIN_MENTION_ALTERNATIVE_CHARS: usize = 3;

/// Which precedence rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Alias,
    Title,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub definition: &'a ServiceDefinition,
    pub kind: MatchKind,
}

impl Catalog {
    /// Best catalog entry for a phrase or provider resource type, or `None`.
    ///
    /// Precedence: exact alias, exact title (or id), then the longest alias/title contained in the
    /// phrase.
    pub fn resolve(&self, query: &str) -> Option<&ServiceDefinition> {
        self.resolve_with_kind(query).map(|r| r.definition)
    }

    pub fn resolve_with_kind(&self, query: &str) -> Option<Resolution<'_>> {
        let key = lookup_key(query);
        if key.is_empty() {
            return None;
        }
        if let Some(&idx) = self.aliases.get(&key) {
            return Some(self.resolution(idx, MatchKind::Alias));
        }
        if let Some(&idx) = self.by_title.get(&key) {
            return Some(self.resolution(idx, MatchKind::Title));
        }
        if let Some(&idx) = self.by_id.get(query.trim()) {
            return Some(self.resolution(idx, MatchKind::Title));
        }

        let normalized = normalize_phrase(&key);
        let normalized = truncate_at_char_boundary(&normalized, MAX_CONTAINMENT_QUERY_BYTES);
        if normalized.is_empty() {
            return None;
        }
        self.containment
            .iter()
            .find(|(needle, _)| contains_phrase(normalized, needle))
            .map(|(_, idx)| self.resolution(*idx, MatchKind::Contains))
    }

    /// Resolves a structured-payload service reference: title first, then the raw id, then a
    /// name derived from an icon id (`.../00039-icon-service-Event-Hubs`).
    pub fn resolve_reference(
        &self,
        title: Option<&str>,
        id: Option<&str>,
    ) -> Option<&ServiceDefinition> {
        if let Some(def) = title.and_then(|t| self.resolve(t)) {
            return Some(def);
        }
        let id = id?;
        if let Some(&idx) = self.by_id.get(id.trim()) {
            return Some(&self.definitions[idx]);
        }
        if let Some(derived) = title_from_icon_id(id) {
            if let Some(def) = self.resolve(&derived) {
                return Some(def);
            }
        }
        let key = lookup_key(id);
        self.aliases
            .get(&key)
            .or_else(|| self.by_title.get(&key))
            .map(|&idx| &self.definitions[idx])
    }

    /// Case-insensitive, word-bounded regex matching any alias or title, longest alternative
    /// first. `None` when the catalog has nothing mentionable or the pattern fails to compile.
    pub fn mention_regex(&self) -> Option<&Regex> {
        self.mention_re
            .get_or_init(|| self.build_mention_regex())
            .as_ref()
    }

    fn build_mention_regex(&self) -> Option<Regex> {
        let mut alternatives: Vec<String> = self
            .aliases
            .keys()
            .cloned()
            .chain(self.definitions.iter().map(|d| d.title.to_lowercase()))
            .filter(|alt| is_mentionable(alt))
            .collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        alternatives.dedup();
        if alternatives.is_empty() {
            return None;
        }

        let body = alternatives
            .iter()
            .map(|alt| regex::escape(alt))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"\b(?:{body})\b");
        match RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(64 * (1 << 20))
            .build()
        {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!(error = %err, "catalog mention pattern failed to compile");
                None
            }
        }
    }

    /// The definition a mention-regex match refers to.
    pub fn resolve_mention(&self, matched: &str) -> Option<&ServiceDefinition> {
        let key = lookup_key(matched);
        self.aliases
            .get(&key)
            .or_else(|| self.by_title.get(&key))
            .map(|&idx| &self.definitions[idx])
            .or_else(|| self.resolve(matched))
    }

    fn resolution(&self, idx: usize, kind: MatchKind) -> Resolution<'_> {
        Resolution {
            definition: &self.definitions[idx],
            kind,
        }
    }
}

fn is_mentionable(alt: &str) -> bool {
    let mut chars = alt.chars();
    let (Some(first), Some(last)) = (chars.next(), alt.chars().last()) else {
        return false;
    };
    alt.chars().count() >= MIN_MENTION_ALTERNATIVE_CHARS
        && first.is_alphanumeric()
        && last.is_alphanumeric()
}
